//! Key placement.

use crate::types::{AccountId, NodeId};
use ledger_cluster::Membership;
use std::sync::Arc;

/// Maps account keys to the nodes that own their replicas.
///
/// The owners of key `k` are `replication_factor` consecutive members of
/// the sorted member list, starting at index `k mod n`. Placement is a
/// pure function of the key and the member list, so every node computes
/// the same ordered replica set.
pub struct KeyRouter {
    membership: Arc<dyn Membership>,
    replication_factor: usize,
}

impl KeyRouter {
    /// Creates a router. A factor of zero is treated as one.
    pub fn new(membership: Arc<dyn Membership>, replication_factor: usize) -> Self {
        Self {
            membership,
            replication_factor: replication_factor.max(1),
        }
    }

    /// Returns the local node.
    pub fn local_node(&self) -> NodeId {
        self.membership.local_node()
    }

    /// Returns every cluster member.
    pub fn members(&self) -> Vec<NodeId> {
        self.membership.members()
    }

    /// Checks whether `node` can currently be reached.
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.membership.is_reachable(node)
    }

    /// Returns the ordered replica set for `key`.
    pub fn owners(&self, key: AccountId) -> Vec<NodeId> {
        let mut members = self.membership.members();
        if members.is_empty() {
            return Vec::new();
        }
        members.sort_unstable();

        let n = members.len();
        let count = self.replication_factor.min(n);
        // rem_euclid keeps negative keys in 0..n
        let start = key.as_i64().rem_euclid(n as i64) as usize;

        (0..count).map(|i| members[(start + i) % n]).collect()
    }

    /// Returns the owners of `key` other than the local node.
    pub fn remote_owners(&self, key: AccountId) -> Vec<NodeId> {
        let local = self.local_node();
        self.owners(key)
            .into_iter()
            .filter(|node| *node != local)
            .collect()
    }
}

impl std::fmt::Debug for KeyRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRouter")
            .field("local_node", &self.local_node())
            .field("replication_factor", &self.replication_factor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_cluster::{ClusterConfig, InMemoryCluster};

    fn router(nodes: u32, factor: usize) -> KeyRouter {
        let cluster = Arc::new(InMemoryCluster::new(ClusterConfig::new(nodes)));
        KeyRouter::new(cluster, factor)
    }

    #[test]
    fn owners_are_consecutive_members() {
        let router = router(4, 2);
        assert_eq!(router.owners(AccountId::new(0)), vec![NodeId(0), NodeId(1)]);
        assert_eq!(router.owners(AccountId::new(3)), vec![NodeId(3), NodeId(0)]);
        assert_eq!(router.owners(AccountId::new(6)), vec![NodeId(2), NodeId(3)]);
    }

    #[test]
    fn negative_keys_are_placed() {
        let router = router(3, 2);
        assert_eq!(router.owners(AccountId::new(-1)), vec![NodeId(2), NodeId(0)]);
    }

    #[test]
    fn factor_is_capped_at_cluster_size() {
        let router = router(2, 5);
        assert_eq!(router.owners(AccountId::new(1)).len(), 2);
    }

    #[test]
    fn zero_factor_still_has_an_owner() {
        let router = router(3, 0);
        assert_eq!(router.owners(AccountId::new(1)), vec![NodeId(1)]);
    }

    #[test]
    fn remote_owners_exclude_local() {
        let router = router(3, 3);
        let remote = router.remote_owners(AccountId::new(0));
        assert_eq!(remote, vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn placement_is_stable() {
        let router = router(5, 3);
        let key = AccountId::new(12345);
        assert_eq!(router.owners(key), router.owners(key));
    }
}
