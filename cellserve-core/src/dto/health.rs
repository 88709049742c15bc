//! Health DTOs

use serde::{Deserialize, Serialize};

/// Snapshot of the worker pool's load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of execution slots
    pub size: usize,

    /// Jobs waiting for a free slot
    pub queued: usize,

    /// Jobs currently holding a slot
    pub active: usize,
}

/// Response of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_healthy: bool,
    pub pool: PoolStats,
}
