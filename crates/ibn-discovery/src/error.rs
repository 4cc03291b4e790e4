//! Discovery error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache index error: {0}")]
    Index(String),

    #[error("repository error: {0}")]
    Repository(String),
}

/// Convenience alias for discovery results.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
