//! Data Transfer Objects for the HTTP API
//!
//! Request and response bodies shared by the server, which produces them,
//! and the client, which decodes them.

pub mod health;
pub mod job;
