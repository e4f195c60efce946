//! Error type for container construction.
//!
//! Container operations themselves never fail: absence is `None` or the
//! caller's default, and allocation failure aborts.

use thiserror::Error;

/// Errors raised while building a container from configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A sharded map needs at least one bucket.
    #[error("bucket count must be positive")]
    ZeroBuckets,

    /// A map configuration document could not be parsed.
    #[error("invalid map configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
