//! Ledger configuration.

use std::time::Duration;

/// Configuration for a ledger node.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// How long a transaction waits for a single key's lock.
    pub lock_timeout: Duration,

    /// How long to wait for each replica acknowledgement.
    pub replication_timeout: Duration,

    /// Number of nodes owning each key (capped at cluster size).
    pub replication_factor: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(15),
            replication_timeout: Duration::from_secs(5),
            replication_factor: 2,
        }
    }
}

impl LedgerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-key lock acquisition timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the per-replica acknowledgement timeout.
    #[must_use]
    pub const fn replication_timeout(mut self, timeout: Duration) -> Self {
        self.replication_timeout = timeout;
        self
    }

    /// Sets the number of owners per key.
    #[must_use]
    pub const fn replication_factor(mut self, factor: usize) -> Self {
        self.replication_factor = factor;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.lock_timeout, Duration::from_secs(15));
        assert_eq!(config.replication_factor, 2);
        assert_eq!(config.replication_timeout, Duration::from_secs(5));
    }

    #[test]
    fn builder_pattern() {
        let config = LedgerConfig::new()
            .replication_timeout(Duration::from_secs(1))
            .lock_timeout(Duration::from_millis(50))
            .replication_factor(3);

        assert_eq!(config.replication_timeout, Duration::from_secs(1));
        assert_eq!(config.lock_timeout, Duration::from_millis(50));
        assert_eq!(config.replication_factor, 3);
    }
}
