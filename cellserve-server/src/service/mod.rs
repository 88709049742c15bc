//! Service Module
//!
//! Business logic layer for the server.
//! Services stage uploads, submit jobs to the runner and read results back.

pub mod download;
pub mod preview;
pub mod submission;
pub mod upload;

// Re-export for convenience
pub use download as download_service;
pub use preview as preview_service;
pub use submission as submission_service;
