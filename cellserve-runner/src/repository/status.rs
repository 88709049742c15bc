//! Status repository
//!
//! Contract shared by every status store:
//! - a write replaces the whole record for the job and restarts its expiry
//! - a read returns the latest record, or `None` once it expired or if it was
//!   never written
//! - storage faults surface as [`StoreError::Unavailable`], never as `None`

use async_trait::async_trait;
use cellserve_core::domain::job::JobId;
use cellserve_core::domain::record::StatusRecord;
use thiserror::Error;

/// Errors raised by a status store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the command
    #[error("status store unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be decoded
    #[error("corrupt status record under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for storage
    #[error("failed to encode status record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Repository trait for job status records
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Stores `record` as the job's latest state
    ///
    /// Overwrites any previous record of the job and refreshes its expiry.
    async fn write(&self, id: &JobId, record: &StatusRecord) -> Result<(), StoreError>;

    /// Fetches the job's latest state
    ///
    /// # Returns
    /// `None` if the job was never recorded or its record expired
    async fn read(&self, id: &JobId) -> Result<Option<StatusRecord>, StoreError>;

    /// Checks that the store is reachable
    async fn ping(&self) -> Result<(), StoreError>;
}

pub(crate) fn encode(record: &StatusRecord) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(StoreError::Encode)
}

pub(crate) fn decode(key: &str, raw: &str) -> Result<StatusRecord, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}
