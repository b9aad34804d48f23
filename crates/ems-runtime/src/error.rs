//! Server lifecycle errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for server setup
pub type ServerResult<T> = Result<T, ServerError>;

/// Failures while bringing the server up. All of them are fatal.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot create pipe {}: {source}", path.display())]
    Fifo { path: PathBuf, source: io::Error },

    #[error("cannot open pipe {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to spawn {name}: {source}")]
    Spawn { name: String, source: io::Error },

    #[error("server is already running")]
    AlreadyRunning,
}
