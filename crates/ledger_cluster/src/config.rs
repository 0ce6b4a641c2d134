//! Configuration for the in-process cluster.

use std::time::Duration;

/// Configuration for [`crate::InMemoryCluster`].
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of nodes, including the local node.
    pub nodes: u32,
    /// Local node index (must be below `nodes`).
    pub local_node: u32,
    /// Simulated one-way delivery latency.
    pub latency: Duration,
}

impl ClusterConfig {
    /// Creates a configuration for `nodes` nodes with node 0 as local.
    #[must_use]
    pub const fn new(nodes: u32) -> Self {
        Self {
            nodes,
            local_node: 0,
            latency: Duration::ZERO,
        }
    }

    /// Sets the local node index.
    #[must_use]
    pub const fn with_local_node(mut self, node: u32) -> Self {
        self.local_node = node;
        self
    }

    /// Sets the simulated delivery latency.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
