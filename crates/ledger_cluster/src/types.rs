//! Cluster type definitions.

use ledger_codec::AccountId;
use std::fmt;

/// Identifier of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Creates a new node ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// A single key mutation shipped to a replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaWrite {
    /// Store the encoded account under `key`.
    Put {
        /// Account key.
        key: AccountId,
        /// Encoded account (see `ledger_codec`).
        payload: Vec<u8>,
    },
    /// Remove `key` from the replica.
    Remove {
        /// Account key.
        key: AccountId,
    },
}

impl ReplicaWrite {
    /// Returns the key this write touches.
    pub fn key(&self) -> AccountId {
        match self {
            ReplicaWrite::Put { key, .. } | ReplicaWrite::Remove { key } => *key,
        }
    }
}

/// Messages exchanged between the coordinator and replica nodes.
///
/// Writes are shipped in two phases: `Prepare` stages them on the replica
/// without making them visible, `Commit` applies the staged set and `Abort`
/// discards it. `Restore` applies writes directly and is used to put back
/// earlier values when a commit could not reach every replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationMessage {
    /// Stage writes for a transaction.
    Prepare {
        /// Transaction the writes belong to.
        txid: u64,
        /// Writes to stage.
        writes: Vec<ReplicaWrite>,
    },
    /// Apply the writes staged for a transaction.
    Commit {
        /// Transaction to commit.
        txid: u64,
    },
    /// Discard the writes staged for a transaction.
    Abort {
        /// Transaction to abort.
        txid: u64,
    },
    /// Apply writes immediately.
    Restore {
        /// Writes to apply.
        writes: Vec<ReplicaWrite>,
    },
    /// Drop every key held by the replica.
    Clear,
}

impl ReplicationMessage {
    /// Short name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationMessage::Prepare { .. } => "prepare",
            ReplicationMessage::Commit { .. } => "commit",
            ReplicationMessage::Abort { .. } => "abort",
            ReplicationMessage::Restore { .. } => "restore",
            ReplicationMessage::Clear => "clear",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId::new(4)), "node:4");
    }

    #[test]
    fn replica_write_key() {
        let put = ReplicaWrite::Put {
            key: AccountId::new(3),
            payload: vec![],
        };
        let remove = ReplicaWrite::Remove {
            key: AccountId::new(8),
        };
        assert_eq!(put.key(), AccountId::new(3));
        assert_eq!(remove.key(), AccountId::new(8));
    }

    #[test]
    fn message_kind() {
        assert_eq!(ReplicationMessage::Commit { txid: 1 }.kind(), "commit");
        assert_eq!(ReplicationMessage::Clear.kind(), "clear");
    }
}
