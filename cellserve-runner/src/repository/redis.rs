//! Redis status repository
//!
//! Records are stored as JSON strings under `task:<job id>` with `SETEX`, so
//! Redis drops them on its own once the TTL elapses.

use async_trait::async_trait;
use cellserve_core::domain::job::JobId;
use cellserve_core::domain::record::StatusRecord;
use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::{debug, info};

use super::status::{StatusRepository, StoreError, decode, encode};

/// Redis implementation of StatusRepository
///
/// Cloning the connection manager is cheap and every clone multiplexes over
/// the same connection, which reconnects on its own after failures.
#[derive(Clone)]
pub struct RedisStatusRepository {
    connection: ConnectionManager,
    ttl: Duration,
}

impl RedisStatusRepository {
    /// Connects to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Connection URL (e.g., "redis://127.0.0.1:6379/0")
    /// * `ttl` - Expiry applied to every write
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;

        info!("Connected to status store at {}", redis_url);

        Ok(Self { connection, ttl })
    }
}

#[async_trait]
impl StatusRepository for RedisStatusRepository {
    async fn write(&self, id: &JobId, record: &StatusRecord) -> Result<(), StoreError> {
        let payload = encode(record)?;
        let mut connection = self.connection.clone();

        let _: () = connection
            .set_ex(id.store_key(), payload, self.ttl.as_secs())
            .await?;

        debug!("Stored status {} for job {}", record.status, id);
        Ok(())
    }

    async fn read(&self, id: &JobId) -> Result<Option<StatusRecord>, StoreError> {
        let key = id.store_key();
        let mut connection = self.connection.clone();

        let raw: Option<String> = connection.get(&key).await?;

        raw.map(|raw| decode(&key, &raw)).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }
}
