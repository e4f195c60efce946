//! Construction-time configuration for `ShardedMap`.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default bucket count: a small prime, so integer and string hashes do
/// not cluster on a common factor.
pub const BUCKETS_COUNT_DEFAULT: usize = 19;

/// Configuration for a sharded map.
///
/// The bucket count is fixed for the lifetime of the map it builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    /// Number of independently locked buckets
    pub buckets_count: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            buckets_count: BUCKETS_COUNT_DEFAULT,
        }
    }
}

impl MapConfig {
    /// Set the bucket count.
    #[must_use]
    pub fn with_buckets_count(mut self, buckets_count: usize) -> Self {
        self.buckets_count = buckets_count;
        self
    }

    /// Reject configurations no map can be built from.
    pub fn validate(&self) -> Result<()> {
        if self.buckets_count == 0 {
            return Err(Error::ZeroBuckets);
        }
        Ok(())
    }

    /// Parse and validate a JSON document such as `{"buckets_count": 64}`.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(document: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }
}
