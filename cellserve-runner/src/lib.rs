//! Cellserve Runner
//!
//! Runs segmentation and training jobs off the request path and keeps their
//! status records current.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Status records in Redis or in memory, expiring after a TTL
//! - Scheduler: Fixed-size worker pool and the job runner on top of it
//! - Services: Segmentation backend, process bridge and job bodies
//!
//! A submission writes its initial status synchronously, then queues the job
//! body. The body runs on the blocking thread pool and ends with exactly one
//! terminal status write, whether it returns, fails or panics.

pub mod config;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use config::{Config, StoreBackend};
pub use scheduler::{JobRunner, Submission};
