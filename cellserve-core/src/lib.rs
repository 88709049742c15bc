//! Cellserve Core
//!
//! Core types and abstractions for the cellserve segmentation backend.
//!
//! This crate contains:
//! - Domain types: job identities, statuses, status records and job outputs
//! - DTOs: Data transfer objects shared by the server, client and CLI
//! - Clock: the time source used for identities, timestamps and expiry

pub mod clock;
pub mod domain;
pub mod dto;
