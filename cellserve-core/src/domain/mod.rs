//! Core domain types
//!
//! This module contains the core domain structures used across cellserve crates.
//! The server writes and reads them, the runner produces them from job bodies and
//! the client decodes them from HTTP responses.

pub mod job;
pub mod params;
pub mod record;
