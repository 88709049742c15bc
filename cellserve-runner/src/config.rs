//! Runner configuration
//!
//! Defines all configurable parameters for job execution including the
//! status store connection, worker pool size, record expiry, data layout and
//! the command used to reach the segmentation model.

use cellserve_core::domain::job::JobId;
use std::path::PathBuf;
use std::time::Duration;

/// Which status store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Redis, durable across restarts
    Redis,

    /// Process memory, for single-process development and tests
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("unknown store backend '{}'", other),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379/0")
    pub redis_url: String,

    pub store_backend: StoreBackend,

    /// Number of jobs that may run at the same time
    pub pool_size: usize,

    /// How long a status record lives after its last write
    pub status_ttl: Duration,

    /// Root of uploads/, output/, datasets/ and models/
    pub data_dir: PathBuf,

    /// Interpreter used to run the model bridge (e.g., "python3")
    pub cellpose_command: String,

    /// Bridge script passed to `cellpose_command`
    ///
    /// Not shipped with the server; see `service::command` for the protocol it
    /// has to speak.
    pub cellpose_script: PathBuf,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(redis_url: String, data_dir: PathBuf) -> Self {
        Self {
            redis_url,
            store_backend: StoreBackend::Redis,
            pool_size: 4,
            status_ttl: Duration::from_secs(86_400), // 1 day
            data_dir,
            cellpose_command: "python3".to_string(),
            cellpose_script: PathBuf::from("cellpose_bridge.py"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - REDIS_URL (optional, default: redis://127.0.0.1:6379/0)
    /// - CELLSERVE_STORE (optional, "redis" or "memory", default: redis)
    /// - WORKER_POOL_SIZE (optional, default: 4)
    /// - STATUS_TTL (optional, seconds, default: 86400)
    /// - CELLSERVE_DATA_DIR (optional, default: ./data)
    /// - CELLPOSE_COMMAND (optional, default: python3)
    /// - CELLPOSE_SCRIPT (optional, default: cellpose_bridge.py)
    pub fn from_env() -> anyhow::Result<Self> {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let data_dir = std::env::var("CELLSERVE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let mut config = Self::new(redis_url, data_dir);

        if let Ok(backend) = std::env::var("CELLSERVE_STORE") {
            config.store_backend = backend.parse()?;
        }

        if let Some(pool_size) = std::env::var("WORKER_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.pool_size = pool_size;
        }

        if let Some(ttl) = std::env::var("STATUS_TTL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.status_ttl = Duration::from_secs(ttl);
        }

        if let Ok(command) = std::env::var("CELLPOSE_COMMAND") {
            config.cellpose_command = command;
        }

        if let Ok(script) = std::env::var("CELLPOSE_SCRIPT") {
            config.cellpose_script = PathBuf::from(script);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store_backend == StoreBackend::Redis
            && !self.redis_url.starts_with("redis://")
            && !self.redis_url.starts_with("rediss://")
        {
            anyhow::bail!("redis_url must start with redis:// or rediss://");
        }

        if self.pool_size == 0 {
            anyhow::bail!("pool_size must be greater than 0");
        }

        if self.status_ttl.as_secs() == 0 {
            anyhow::bail!("status_ttl must be at least one second");
        }

        if self.cellpose_command.trim().is_empty() {
            anyhow::bail!("cellpose_command cannot be empty");
        }

        Ok(())
    }

    /// Directory holding a job's uploaded files
    pub fn upload_dir(&self, id: &JobId) -> PathBuf {
        self.data_dir.join("uploads").join(id.as_str())
    }

    /// Directory a segmentation job writes masks and overlays into
    pub fn output_dir(&self, id: &JobId) -> PathBuf {
        self.data_dir.join("output").join(id.as_str())
    }

    /// Training images and masks of a training job
    pub fn train_dir(&self, id: &JobId) -> PathBuf {
        self.data_dir.join("datasets").join("train").join(id.as_str())
    }

    /// Held-out images and masks of a training job
    pub fn test_dir(&self, id: &JobId) -> PathBuf {
        self.data_dir.join("datasets").join("test").join(id.as_str())
    }

    /// Where trained models are saved
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            "redis://127.0.0.1:6379/0".to_string(),
            PathBuf::from("./data"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.status_ttl, Duration::from_secs(86_400));
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.pool_size = 0;
        assert!(config.validate().is_err());
        config.pool_size = 2;

        config.redis_url = "localhost:6379".to_string();
        assert!(config.validate().is_err());

        // The URL is irrelevant for the memory store
        config.store_backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());

        config.status_ttl = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("redis".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_data_layout() {
        let config = Config::new("redis://localhost".to_string(), PathBuf::from("/srv/cells"));
        let id = JobId::parse("2025-01-01-00-00-00-000").unwrap();

        assert_eq!(
            config.upload_dir(&id),
            PathBuf::from("/srv/cells/uploads/2025-01-01-00-00-00-000")
        );
        assert_eq!(
            config.output_dir(&id),
            PathBuf::from("/srv/cells/output/2025-01-01-00-00-00-000")
        );
        assert_eq!(
            config.train_dir(&id),
            PathBuf::from("/srv/cells/datasets/train/2025-01-01-00-00-00-000")
        );
        assert_eq!(config.models_dir(), PathBuf::from("/srv/cells/models"));
    }
}
