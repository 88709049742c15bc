//! Cellserve Server
//!
//! HTTP front of the segmentation service. Requests stage uploads, hand jobs
//! to the job runner and answer status polls from the status store; no
//! handler ever waits for a model run.

pub mod api;
pub mod config;
pub mod service;
pub mod state;

pub use api::create_router;
pub use config::ServerConfig;
pub use state::AppState;
