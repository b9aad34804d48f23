//! Server Configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Command-line arguments (applied by the binary through the builders)
//! 2. Environment variables
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use ems_runtime::config::ServerConfig;
//!
//! let config = ServerConfig::from_env("/tmp/ems.fifo")
//!     .pool_size(4)
//!     .state_access_delay_us(0);
//! config.validate()?;
//! ```

pub mod defaults;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ems_core::env::env_get;
use ems_core::StateAccessDelay;
use thiserror::Error;

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pool size {0} is outside 1..={max}", max = defaults::MAX_POOL_SIZE)]
    PoolSize(usize),

    #[error("server pipe path is empty")]
    EmptyPipePath,
}

/// Server configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Well-known FIFO clients register on
    pub pipe_path: PathBuf,
    /// Number of workers, and capacity of the session buffer
    pub pool_size: usize,
    /// Delay applied on every access to event state
    pub state_access_delay: Duration,
}

impl ServerConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `EMS_POOL_SIZE` - Number of workers
    /// - `EMS_STATE_ACCESS_DELAY_US` - Artificial delay in microseconds
    pub fn from_env(pipe_path: impl Into<PathBuf>) -> Self {
        Self {
            pipe_path: pipe_path.into(),
            pool_size: env_get("EMS_POOL_SIZE", defaults::POOL_SIZE),
            state_access_delay: Duration::from_micros(u64::from(env_get(
                "EMS_STATE_ACCESS_DELAY_US",
                defaults::STATE_ACCESS_DELAY_US,
            ))),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new(pipe_path: impl Into<PathBuf>) -> Self {
        Self {
            pipe_path: pipe_path.into(),
            pool_size: defaults::POOL_SIZE,
            state_access_delay: Duration::from_micros(u64::from(defaults::STATE_ACCESS_DELAY_US)),
        }
    }

    // Builder methods

    pub fn pool_size(mut self, n: usize) -> Self {
        self.pool_size = n;
        self
    }

    pub fn state_access_delay(mut self, d: Duration) -> Self {
        self.state_access_delay = d;
        self
    }

    pub fn state_access_delay_us(self, us: u32) -> Self {
        self.state_access_delay(Duration::from_micros(u64::from(us)))
    }

    pub fn pipe_path(&self) -> &Path {
        &self.pipe_path
    }

    pub fn delay(&self) -> StateAccessDelay {
        StateAccessDelay::new(self.state_access_delay)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipe_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPipePath);
        }
        if !(1..=defaults::MAX_POOL_SIZE).contains(&self.pool_size) {
            return Err(ConfigError::PoolSize(self.pool_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new("/tmp/ems");
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.state_access_delay, Duration::from_micros(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders_and_validate() {
        let config = ServerConfig::new("/tmp/ems").pool_size(0);
        assert_eq!(config.validate(), Err(ConfigError::PoolSize(0)));

        let config = ServerConfig::new("/tmp/ems").pool_size(65);
        assert_eq!(config.validate(), Err(ConfigError::PoolSize(65)));

        let config = ServerConfig::new("").pool_size(2);
        assert_eq!(config.validate(), Err(ConfigError::EmptyPipePath));

        let config = ServerConfig::new("/tmp/ems").state_access_delay_us(0);
        assert!(config.delay().duration().is_zero());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("EMS_POOL_SIZE", "3");
        std::env::set_var("EMS_STATE_ACCESS_DELAY_US", "250");
        let config = ServerConfig::from_env("/tmp/ems");
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.state_access_delay, Duration::from_micros(250));

        std::env::set_var("EMS_POOL_SIZE", "lots");
        assert_eq!(ServerConfig::from_env("/tmp/ems").pool_size, defaults::POOL_SIZE);

        std::env::remove_var("EMS_POOL_SIZE");
        std::env::remove_var("EMS_STATE_ACCESS_DELAY_US");
    }
}
