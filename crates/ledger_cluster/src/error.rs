//! Error types for cluster operations.

use crate::types::NodeId;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur while talking to cluster members.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The node could not be reached.
    #[error("node {node} is unreachable")]
    Unreachable {
        /// The unreachable node.
        node: NodeId,
    },

    /// The node did not acknowledge within the bound.
    #[error("node {node} did not acknowledge in time")]
    Timeout {
        /// The slow node.
        node: NodeId,
    },

    /// The node received the message but refused to apply it.
    #[error("node {node} rejected message: {reason}")]
    Rejected {
        /// The rejecting node.
        node: NodeId,
        /// Why the message was rejected.
        reason: String,
    },

    /// The node is not a cluster member.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The local node has not joined the cluster.
    #[error("local node has not joined the cluster")]
    NotJoined,
}

impl ClusterError {
    /// Creates a rejected error.
    pub fn rejected(node: NodeId, reason: impl Into<String>) -> Self {
        Self::Rejected {
            node,
            reason: reason.into(),
        }
    }

    /// Returns the node the error concerns, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            ClusterError::Unreachable { node }
            | ClusterError::Timeout { node }
            | ClusterError::Rejected { node, .. } => Some(*node),
            ClusterError::UnknownNode(node) => Some(*node),
            ClusterError::NotJoined => None,
        }
    }

    /// Returns true if the operation may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClusterError::Unreachable { .. } | ClusterError::Timeout { .. }
        )
    }
}
