//! Membership and transport abstractions.

use crate::error::ClusterResult;
use crate::types::{NodeId, ReplicationMessage};
use ledger_codec::AccountId;
use std::time::Duration;

/// Cluster membership as seen by the local node.
///
/// Implementations decide who the members are and whether a member is
/// currently reachable. They do not decide key placement; the ledger's key
/// router derives replica sets from [`Membership::members`].
pub trait Membership: Send + Sync {
    /// Returns the local node.
    fn local_node(&self) -> NodeId;

    /// Returns all current members, sorted ascending.
    fn members(&self) -> Vec<NodeId>;

    /// Checks whether a member can currently be reached.
    fn is_reachable(&self, node: NodeId) -> bool;

    /// Joins the local node to the cluster.
    fn join(&self) -> ClusterResult<()>;

    /// Removes the local node from the cluster.
    fn leave(&self) -> ClusterResult<()>;

    /// Checks if the local node is joined.
    fn is_joined(&self) -> bool;
}

/// Delivers replication messages to other nodes.
///
/// `send` returns only once the receiving node has applied the message
/// and acknowledged it, or fails. A failed send leaves the caller unsure
/// whether the message was applied; callers compensate explicitly.
pub trait ReplicaTransport: Send + Sync {
    /// Sends a message and waits for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Fails if the node is unknown or unreachable, rejects the message,
    /// or does not acknowledge within `timeout`.
    fn send(&self, to: NodeId, message: &ReplicationMessage, timeout: Duration)
        -> ClusterResult<()>;

    /// Reads the encoded account a node holds for `key`.
    ///
    /// Used for replica consistency checks, not on the transaction path.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`ReplicaTransport::send`].
    fn fetch(&self, from: NodeId, key: AccountId, timeout: Duration)
        -> ClusterResult<Option<Vec<u8>>>;
}
