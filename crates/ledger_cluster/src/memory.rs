//! In-process cluster for tests and simulation.

use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::transport::{Membership, ReplicaTransport};
use crate::types::{NodeId, ReplicaWrite, ReplicationMessage};
use ledger_codec::AccountId;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Replica state held by one simulated node.
#[derive(Debug, Default)]
struct ReplicaNode {
    reachable: AtomicBool,
    reject_commits: AtomicBool,
    reject_clears: AtomicBool,
    data: RwLock<BTreeMap<AccountId, Vec<u8>>>,
    staged: Mutex<HashMap<u64, Vec<ReplicaWrite>>>,
    delivered: AtomicU64,
}

impl ReplicaNode {
    fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn apply(&self, id: NodeId, message: &ReplicationMessage) -> ClusterResult<()> {
        match message {
            ReplicationMessage::Prepare { txid, writes } => {
                self.staged.lock().insert(*txid, writes.clone());
            }
            ReplicationMessage::Commit { txid } => {
                if self.reject_commits.load(Ordering::SeqCst) {
                    return Err(ClusterError::rejected(id, "commit refused"));
                }
                let writes = self
                    .staged
                    .lock()
                    .remove(txid)
                    .ok_or_else(|| ClusterError::rejected(id, format!("unknown transaction {txid}")))?;
                self.write_all(&writes);
            }
            ReplicationMessage::Abort { txid } => {
                self.staged.lock().remove(txid);
            }
            ReplicationMessage::Restore { writes } => self.write_all(writes),
            ReplicationMessage::Clear => {
                if self.reject_clears.load(Ordering::SeqCst) {
                    return Err(ClusterError::rejected(id, "clear refused"));
                }
                self.data.write().clear();
                self.staged.lock().clear();
            }
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_all(&self, writes: &[ReplicaWrite]) {
        let mut data = self.data.write();
        for write in writes {
            match write {
                ReplicaWrite::Put { key, payload } => {
                    data.insert(*key, payload.clone());
                }
                ReplicaWrite::Remove { key } => {
                    data.remove(key);
                }
            }
        }
    }
}

/// A cluster whose nodes all live in the current process.
///
/// Implements both [`Membership`] and [`ReplicaTransport`]. Messages are
/// applied synchronously on the caller's thread after the configured
/// latency. Nodes can be partitioned and healed, and can be told to refuse
/// commits or clears, to exercise the ledger's failure paths.
///
/// # Example
///
/// ```
/// use ledger_cluster::{ClusterConfig, InMemoryCluster, Membership, NodeId};
///
/// let cluster = InMemoryCluster::new(ClusterConfig::new(3));
/// cluster.join().unwrap();
/// assert_eq!(cluster.members().len(), 3);
///
/// cluster.partition(NodeId(2));
/// assert!(!cluster.is_reachable(NodeId(2)));
/// ```
#[derive(Debug)]
pub struct InMemoryCluster {
    local: NodeId,
    latency: Duration,
    joined: AtomicBool,
    nodes: BTreeMap<NodeId, ReplicaNode>,
}

impl InMemoryCluster {
    /// Creates a cluster from configuration.
    ///
    /// A configuration with zero nodes still yields the local node.
    pub fn new(config: ClusterConfig) -> Self {
        let count = config.nodes.max(config.local_node + 1);
        let nodes = (0..count)
            .map(|i| (NodeId(i), ReplicaNode::new()))
            .collect();

        Self {
            local: NodeId(config.local_node),
            latency: config.latency,
            joined: AtomicBool::new(false),
            nodes,
        }
    }

    /// Creates a cluster made of the local node only.
    pub fn single_node() -> Self {
        Self::new(ClusterConfig::new(1))
    }

    /// Makes a node unreachable.
    pub fn partition(&self, node: NodeId) {
        if let Some(n) = self.nodes.get(&node) {
            n.reachable.store(false, Ordering::SeqCst);
        }
    }

    /// Makes a node reachable again.
    pub fn heal(&self, node: NodeId) {
        if let Some(n) = self.nodes.get(&node) {
            n.reachable.store(true, Ordering::SeqCst);
        }
    }

    /// Makes a node refuse (or accept again) commit messages.
    pub fn reject_commits(&self, node: NodeId, reject: bool) {
        if let Some(n) = self.nodes.get(&node) {
            n.reject_commits.store(reject, Ordering::SeqCst);
        }
    }

    /// Makes a node refuse (or accept again) clear messages.
    pub fn reject_clears(&self, node: NodeId, reject: bool) {
        if let Some(n) = self.nodes.get(&node) {
            n.reject_clears.store(reject, Ordering::SeqCst);
        }
    }

    /// Returns the keys a node currently holds, bypassing reachability.
    pub fn replica_keys(&self, node: NodeId) -> Vec<AccountId> {
        self.nodes
            .get(&node)
            .map(|n| n.data.read().keys().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the payload a node holds for `key`, bypassing reachability.
    pub fn replica_payload(&self, node: NodeId, key: AccountId) -> Option<Vec<u8>> {
        self.nodes
            .get(&node)
            .and_then(|n| n.data.read().get(&key).cloned())
    }

    /// Returns the number of transactions staged but not yet resolved on a node.
    pub fn staged_count(&self, node: NodeId) -> usize {
        self.nodes.get(&node).map_or(0, |n| n.staged.lock().len())
    }

    /// Returns how many messages a node has applied.
    pub fn delivered(&self, node: NodeId) -> u64 {
        self.nodes
            .get(&node)
            .map_or(0, |n| n.delivered.load(Ordering::SeqCst))
    }

    fn route(&self, node: NodeId, timeout: Duration) -> ClusterResult<&ReplicaNode> {
        if !self.is_joined() {
            return Err(ClusterError::NotJoined);
        }
        let target = self
            .nodes
            .get(&node)
            .ok_or(ClusterError::UnknownNode(node))?;
        if !target.reachable.load(Ordering::SeqCst) {
            return Err(ClusterError::Unreachable { node });
        }
        if !self.latency.is_zero() {
            if self.latency > timeout {
                thread::sleep(timeout);
                return Err(ClusterError::Timeout { node });
            }
            thread::sleep(self.latency);
        }
        Ok(target)
    }
}

impl Membership for InMemoryCluster {
    fn local_node(&self) -> NodeId {
        self.local
    }

    fn members(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    fn is_reachable(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(|n| n.reachable.load(Ordering::SeqCst))
    }

    fn join(&self) -> ClusterResult<()> {
        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn leave(&self) -> ClusterResult<()> {
        self.joined.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }
}

impl ReplicaTransport for InMemoryCluster {
    fn send(
        &self,
        to: NodeId,
        message: &ReplicationMessage,
        timeout: Duration,
    ) -> ClusterResult<()> {
        let target = self.route(to, timeout)?;
        debug!(node = %to, kind = message.kind(), "delivering replication message");
        target.apply(to, message)
    }

    fn fetch(
        &self,
        from: NodeId,
        key: AccountId,
        timeout: Duration,
    ) -> ClusterResult<Option<Vec<u8>>> {
        let target = self.route(from, timeout)?;
        let payload = target.data.read().get(&key).cloned();
        Ok(payload)
    }
}
