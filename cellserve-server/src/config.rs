//! Server configuration
//!
//! Bind address plus everything the job runner needs.

use cellserve_runner::Config;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to (e.g., "0.0.0.0:5000")
    pub bind_addr: String,

    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,

    pub runner: Config,
}

impl ServerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CELLSERVE_BIND_ADDR (optional, default: 0.0.0.0:5000)
    /// - CELLSERVE_MAX_UPLOAD_MB (optional, default: 512)
    /// - everything read by the runner configuration
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self {
            runner: Config::from_env()?,
            ..Self::default()
        };

        if let Ok(addr) = std::env::var("CELLSERVE_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(mb) = std::env::var("CELLSERVE_MAX_UPLOAD_MB")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.trim().is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        self.runner.validate()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            max_upload_bytes: 512 * 1024 * 1024,
            runner: Config::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.runner.pool_size, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_covers_runner() {
        let mut config = ServerConfig::default();
        config.runner.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }
}
