//! Scheduler layer
//!
//! The worker pool bounds how many jobs run at once; the job runner wraps each
//! job body with its status transitions.

pub mod pool;
pub mod runner;

pub use pool::{PoolError, WorkerPool};
pub use runner::{JobCompletion, JobContext, JobHandle, JobRunner, RunnerError, Submission};
