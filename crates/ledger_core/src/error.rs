//! Error types for the ledger.

use crate::types::TransactionId;
use ledger_cluster::{ClusterError, NodeId};
use ledger_codec::{AccountId, CodecError};
use std::time::Duration;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// Every failure inside a transaction is reported after the transaction
/// has rolled back; no variant implies partial effects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The account already exists.
    #[error("account already exists: {id}")]
    AlreadyExists {
        /// The duplicate account.
        id: AccountId,
    },

    /// The account does not exist.
    #[error("account not found: {id}")]
    NotFound {
        /// The missing account.
        id: AccountId,
    },

    /// A lock could not be acquired in time.
    #[error("timed out after {waited:?} waiting for lock on {key} held by {holder}")]
    LockTimeout {
        /// The contended key.
        key: AccountId,
        /// The transaction holding the lock when the wait gave up.
        holder: TransactionId,
        /// How long the caller waited.
        waited: Duration,
    },

    /// A replica did not acknowledge a write.
    #[error("replication of {key} to {node} failed: {source}")]
    ReplicationFailure {
        /// The key being replicated.
        key: AccountId,
        /// The node that failed.
        node: NodeId,
        /// The transport failure.
        #[source]
        source: ClusterError,
    },

    /// A clear could not reach every node.
    #[error("clear did not reach {node}: {source}")]
    ClearFailure {
        /// The node that failed.
        node: NodeId,
        /// The transport failure.
        #[source]
        source: ClusterError,
    },

    /// A clear waited too long for running transactions to finish.
    #[error("clear timed out after {waited:?} waiting for running transactions")]
    ClearTimeout {
        /// How long the clear waited.
        waited: Duration,
    },

    /// Applying the transfer would overflow a balance.
    #[error("balance overflow on {id}")]
    BalanceOverflow {
        /// The account whose balance would overflow.
        id: AccountId,
    },

    /// A stored account could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The ledger is closed.
    #[error("ledger is closed")]
    LedgerClosed,

    /// Joining or leaving the cluster failed.
    #[error("cluster error: {0}")]
    Cluster(ClusterError),
}

impl LedgerError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a replication failure from a transport error.
    ///
    /// The node is taken from the error when it names one.
    pub fn replication(key: AccountId, fallback: NodeId, source: ClusterError) -> Self {
        Self::ReplicationFailure {
            key,
            node: source.node().unwrap_or(fallback),
            source,
        }
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// Lock and clear timeouts are always transient. Replication failures are
    /// transient only when the transport says so.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::LockTimeout { .. } | LedgerError::ClearTimeout { .. } => true,
            LedgerError::ReplicationFailure { source, .. }
            | LedgerError::ClearFailure { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_is_transient() {
        let err = LedgerError::LockTimeout {
            key: AccountId::new(1),
            holder: TransactionId::new(4),
            waited: Duration::from_millis(10),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("txn:4"));

        let clear = LedgerError::ClearTimeout {
            waited: Duration::from_millis(10),
        };
        assert!(clear.is_transient());
    }

    #[test]
    fn replication_transience_follows_transport() {
        let unreachable = LedgerError::replication(
            AccountId::new(1),
            NodeId(0),
            ClusterError::Unreachable { node: NodeId(2) },
        );
        assert!(unreachable.is_transient());
        assert!(matches!(
            unreachable,
            LedgerError::ReplicationFailure { node: NodeId(2), .. }
        ));

        let rejected = LedgerError::replication(
            AccountId::new(1),
            NodeId(5),
            ClusterError::NotJoined,
        );
        assert!(!rejected.is_transient());
        assert!(matches!(
            rejected,
            LedgerError::ReplicationFailure { node: NodeId(5), .. }
        ));
    }

    #[test]
    fn lookup_errors_are_not_transient() {
        assert!(!LedgerError::NotFound { id: AccountId::new(1) }.is_transient());
        assert!(!LedgerError::AlreadyExists { id: AccountId::new(1) }.is_transient());
    }

    #[test]
    fn error_display() {
        let err = LedgerError::NotFound {
            id: AccountId::new(-1),
        };
        assert_eq!(err.to_string(), "account not found: acct:-1");
    }
}
