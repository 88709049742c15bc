//! Job domain types

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// Prefix of every status record key in the store
pub const STORE_KEY_PREFIX: &str = "task:";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;
const ID_LEN: usize = TIMESTAMP_LEN + 4;

/// Identity of a submitted job
///
/// Formatted as `YYYY-MM-DD-HH-MM-SS-mmm` in UTC, so identities sort in
/// submission order both as strings and in time. The same string names the
/// job's upload and output directories and its status record.
///
/// Two submissions inside the same millisecond get the same identity and the
/// second one overwrites the first one's record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

/// Rejected job identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job id '{0}': expected YYYY-MM-DD-HH-MM-SS-mmm")]
pub struct JobIdError(pub String);

impl JobId {
    /// Mints a new identity from the clock's current time
    pub fn generate(clock: &dyn Clock) -> Self {
        Self::from_timestamp(clock.now())
    }

    /// Builds the identity a submission at `at` receives
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis().rem_euclid(1000);
        Self(format!("{}-{:03}", at.format(TIMESTAMP_FORMAT), millis))
    }

    /// Parses an identity received from outside, e.g. a query parameter
    ///
    /// Only the exact generated shape is accepted, which also keeps the value
    /// safe to use as a directory name and a store key.
    pub fn parse(raw: &str) -> Result<Self, JobIdError> {
        let invalid = || JobIdError(raw.to_string());

        if raw.len() != ID_LEN || !raw.is_ascii() {
            return Err(invalid());
        }

        for (idx, byte) in raw.bytes().enumerate() {
            let separator = matches!(idx, 4 | 7 | 10 | 13 | 16 | 19);
            let valid = if separator {
                byte == b'-'
            } else {
                byte.is_ascii_digit()
            };
            if !valid {
                return Err(invalid());
            }
        }

        NaiveDateTime::parse_from_str(&raw[..TIMESTAMP_LEN], TIMESTAMP_FORMAT)
            .map_err(|_| invalid())?;

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of this job's status record
    pub fn store_key(&self) -> String {
        format!("{}{}", STORE_KEY_PREFIX, self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobId {
    type Error = JobIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JobId::parse(&value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Lifecycle state of a job
///
/// `Success` and `Failed` are terminal: nothing is written after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, inputs not yet materialized (training only)
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a job does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Inference,
    Training,
}

impl JobKind {
    /// Status written on submission, before the body starts
    pub fn initial_status(self) -> JobStatus {
        match self {
            JobKind::Inference => JobStatus::Running,
            JobKind::Training => JobStatus::Pending,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Inference => write!(f, "inference"),
            JobKind::Training => write!(f, "training"),
        }
    }
}
