pub(crate) const STATE_TREE: &str = "portal-state";

/// Sled store configuration.
#[derive(Debug, Clone)]
pub struct SledDbConfig {
    /// Flush to disk after every batch instead of relying on sled's
    /// periodic background flush.
    pub flush_every_batch: bool,
}

impl SledDbConfig {
    /// Create production configuration with default values
    pub fn production() -> Self {
        Self {
            flush_every_batch: true,
        }
    }

    /// Create test configuration without per-batch flushes
    pub fn test() -> Self {
        Self {
            flush_every_batch: false,
        }
    }
}

impl Default for SledDbConfig {
    fn default() -> Self {
        Self::production()
    }
}
