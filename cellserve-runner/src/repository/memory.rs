//! In-memory status repository
//!
//! Keeps encoded records in a map together with their expiry time. Expiry is
//! evaluated against an injected clock, so tests can step past the TTL
//! without waiting.

use async_trait::async_trait;
use cellserve_core::clock::Clock;
use cellserve_core::domain::job::JobId;
use cellserve_core::domain::record::StatusRecord;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::status::{StatusRepository, StoreError, decode, encode};

struct Entry {
    payload: String,
    expires_at: DateTime<Utc>,
}

/// In-memory implementation of StatusRepository
///
/// Records are stored encoded, exactly as Redis would hold them, so reads go
/// through the same decoding path.
pub struct InMemoryStatusRepository {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl InMemoryStatusRepository {
    /// Creates an empty repository
    ///
    /// # Arguments
    /// * `ttl` - Expiry applied to every write
    /// * `clock` - Time source for expiry
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    /// Number of records that have not expired yet
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StatusRepository for InMemoryStatusRepository {
    async fn write(&self, id: &JobId, record: &StatusRecord) -> Result<(), StoreError> {
        let payload = encode(record)?;
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            id.store_key(),
            Entry {
                payload,
                expires_at,
            },
        );

        Ok(())
    }

    async fn read(&self, id: &JobId) -> Result<Option<StatusRecord>, StoreError> {
        let key = id.store_key();
        let now = self.clock.now();

        let payload = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get(&key) {
                Some(entry) if entry.expires_at > now => Some(entry.payload.clone()),
                Some(_) => {
                    entries.remove(&key);
                    None
                }
                None => None,
            }
        };

        payload.map(|raw| decode(&key, &raw)).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
