//! Replicated account store.

use crate::error::{LedgerError, LedgerResult};
use crate::router::KeyRouter;
use crate::types::{Account, AccountId, NodeId, TransactionId};
use ledger_cluster::{ReplicaTransport, ReplicaWrite, ReplicationMessage};
use ledger_codec::{decode_account, encode_account};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A replica whose copy of an account differs from the local view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaMismatch {
    /// The account key.
    pub key: AccountId,
    /// The replica holding the divergent copy.
    pub node: NodeId,
    /// The local committed account.
    pub expected: Option<Account>,
    /// What the replica holds.
    pub found: Option<Account>,
}

/// The authoritative account map, mirrored to each key's owners.
///
/// Committed values live in a local map that readers consult without
/// taking key locks. Writes reach the local map only after every remote
/// owner has acknowledged them, so a reader never observes a value that
/// could still be rolled back, and a failed write leaves no node changed.
///
/// The store does not lock keys itself. Callers must hold the lock of
/// every key they write (see [`crate::TransactionCoordinator`]).
pub struct ReplicatedStore {
    router: KeyRouter,
    transport: Arc<dyn ReplicaTransport>,
    accounts: RwLock<BTreeMap<AccountId, Account>>,
    replication_timeout: Duration,
}

impl ReplicatedStore {
    /// Creates an empty store.
    pub fn new(
        router: KeyRouter,
        transport: Arc<dyn ReplicaTransport>,
        replication_timeout: Duration,
    ) -> Self {
        Self {
            router,
            transport,
            accounts: RwLock::new(BTreeMap::new()),
            replication_timeout,
        }
    }

    /// Returns the key router.
    pub fn router(&self) -> &KeyRouter {
        &self.router
    }

    /// Returns the committed account for `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key is absent.
    pub fn get(&self, key: AccountId) -> LedgerResult<Account> {
        self.accounts
            .read()
            .get(&key)
            .copied()
            .ok_or(LedgerError::NotFound { id: key })
    }

    /// Checks whether `key` is present.
    pub fn contains_key(&self, key: AccountId) -> bool {
        self.accounts.read().contains_key(&key)
    }

    /// Stores one account on every owner, then locally.
    ///
    /// # Errors
    ///
    /// Returns `ReplicationFailure` if any owner fails to acknowledge; no
    /// node keeps the write in that case.
    pub fn put(&self, txid: TransactionId, account: Account) -> LedgerResult<()> {
        let writes = BTreeMap::from([(account.id, account.balance)]);
        self.commit(txid, &writes)
    }

    /// Applies a transaction's writes on every owner, then locally.
    ///
    /// Replication is two-phase. Every remote owner first stages its share
    /// of the writes; if any stage fails, all stages are aborted. Once all
    /// owners have staged, each is told to commit. If a commit fails, the
    /// owners that already committed get their previous values restored
    /// and the rest are aborted. The local map changes only after every
    /// commit is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `ReplicationFailure` naming the first key and node that
    /// failed.
    pub fn commit(
        &self,
        txid: TransactionId,
        writes: &BTreeMap<AccountId, i64>,
    ) -> LedgerResult<()> {
        let plan = self.plan(writes)?;
        debug!(%txid, keys = writes.len(), replicas = plan.len(), "replicating writes");

        let raw = txid.as_u64();
        let mut prepared: Vec<NodeId> = Vec::with_capacity(plan.len());
        for (node, node_writes) in &plan {
            let message = ReplicationMessage::Prepare {
                txid: raw,
                writes: node_writes.clone(),
            };
            if let Err(e) = self.transport.send(*node, &message, self.replication_timeout) {
                warn!(%txid, %node, error = %e, "prepare failed, aborting replicas");
                prepared.push(*node);
                self.abort_on(raw, &prepared);
                return Err(LedgerError::replication(first_key(node_writes), *node, e));
            }
            prepared.push(*node);
        }

        let mut committed: Vec<NodeId> = Vec::with_capacity(plan.len());
        for (node, node_writes) in &plan {
            let message = ReplicationMessage::Commit { txid: raw };
            if let Err(e) = self.transport.send(*node, &message, self.replication_timeout) {
                warn!(%txid, %node, error = %e, "commit failed, restoring replicas");
                self.restore_on(&plan, &committed);
                let pending: Vec<NodeId> = prepared
                    .iter()
                    .copied()
                    .filter(|n| !committed.contains(n))
                    .collect();
                self.abort_on(raw, &pending);
                return Err(LedgerError::replication(first_key(node_writes), *node, e));
            }
            committed.push(*node);
        }

        let mut accounts = self.accounts.write();
        for (key, balance) in writes {
            accounts.insert(*key, Account::new(*key, *balance));
        }
        Ok(())
    }

    /// Removes every account from every node.
    ///
    /// All members must be reachable before anything is removed. If a
    /// member fails after others were cleared, the cleared members get
    /// their accounts back from the local map, which is left untouched, so
    /// the caller can retry. A member that cannot be refilled is logged
    /// and diverges until the next successful clear.
    ///
    /// Callers must keep commits out while this runs (see
    /// [`crate::TransactionCoordinator::clear`]).
    ///
    /// # Errors
    ///
    /// Returns `ClearFailure` if a member is unreachable or does not
    /// acknowledge.
    pub fn clear(&self) -> LedgerResult<()> {
        let local = self.router.local_node();
        let remote: Vec<NodeId> = self
            .router
            .members()
            .into_iter()
            .filter(|node| *node != local)
            .collect();

        if let Some(node) = remote.iter().find(|n| !self.router.is_reachable(**n)) {
            return Err(LedgerError::ClearFailure {
                node: *node,
                source: ledger_cluster::ClusterError::Unreachable { node: *node },
            });
        }

        let mut cleared: Vec<NodeId> = Vec::with_capacity(remote.len());
        for node in &remote {
            let sent = self
                .transport
                .send(*node, &ReplicationMessage::Clear, self.replication_timeout);
            if let Err(source) = sent {
                warn!(%node, error = %source, "clear failed, refilling cleared replicas");
                self.refill(&cleared);
                return Err(LedgerError::ClearFailure {
                    node: *node,
                    source,
                });
            }
            cleared.push(*node);
        }

        let mut accounts = self.accounts.write();
        let removed = accounts.len();
        accounts.clear();
        info!(removed, nodes = remote.len() + 1, "cleared accounts");
        Ok(())
    }

    /// Returns all keys in ascending order.
    pub fn keys(&self) -> Vec<AccountId> {
        self.accounts.read().keys().copied().collect()
    }

    /// Returns the number of accounts.
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Checks whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Returns the sum of all committed balances.
    ///
    /// Summed as `i128` so that no mix of `i64` balances can overflow.
    pub fn total_balance(&self) -> i128 {
        self.accounts
            .read()
            .values()
            .map(|account| i128::from(account.balance))
            .sum()
    }

    /// Compares every remote owner's copy with the local view.
    ///
    /// # Errors
    ///
    /// Returns `ReplicationFailure` if an owner cannot be read, or a codec
    /// error if an owner holds bytes that do not decode.
    pub fn verify_replicas(&self) -> LedgerResult<Vec<ReplicaMismatch>> {
        let snapshot: Vec<Account> = self.accounts.read().values().copied().collect();
        let mut mismatches = Vec::new();

        for account in snapshot {
            for node in self.router.remote_owners(account.id) {
                let payload = self
                    .transport
                    .fetch(node, account.id, self.replication_timeout)
                    .map_err(|e| LedgerError::replication(account.id, node, e))?;
                let found = payload.as_deref().map(decode_account).transpose()?;
                if found != Some(account) {
                    mismatches.push(ReplicaMismatch {
                        key: account.id,
                        node,
                        expected: Some(account),
                        found,
                    });
                }
            }
        }

        Ok(mismatches)
    }

    /// Groups encoded writes by remote owner.
    fn plan(
        &self,
        writes: &BTreeMap<AccountId, i64>,
    ) -> LedgerResult<BTreeMap<NodeId, Vec<ReplicaWrite>>> {
        let mut plan: BTreeMap<NodeId, Vec<ReplicaWrite>> = BTreeMap::new();
        for (key, balance) in writes {
            let payload = encode_account(&Account::new(*key, *balance))?;
            for node in self.router.remote_owners(*key) {
                plan.entry(node).or_default().push(ReplicaWrite::Put {
                    key: *key,
                    payload: payload.clone(),
                });
            }
        }
        Ok(plan)
    }

    fn abort_on(&self, txid: u64, nodes: &[NodeId]) {
        let message = ReplicationMessage::Abort { txid };
        for node in nodes {
            if let Err(e) = self.transport.send(*node, &message, self.replication_timeout) {
                // Staged writes are invisible, so a lost abort cannot leak values.
                debug!(%node, error = %e, "abort not delivered");
            }
        }
    }

    /// Puts back the local (pre-transaction) values on nodes that committed.
    fn restore_on(&self, plan: &BTreeMap<NodeId, Vec<ReplicaWrite>>, nodes: &[NodeId]) {
        for (node, writes) in self.previous_writes(plan, nodes) {
            self.send_restore(node, writes);
        }
    }

    /// Builds the writes that undo `plan` on `nodes`.
    ///
    /// The account map is only read here, never across a send.
    fn previous_writes(
        &self,
        plan: &BTreeMap<NodeId, Vec<ReplicaWrite>>,
        nodes: &[NodeId],
    ) -> Vec<(NodeId, Vec<ReplicaWrite>)> {
        let accounts = self.accounts.read();
        let mut restores = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Some(node_writes) = plan.get(node) else {
                continue;
            };
            let mut writes = Vec::with_capacity(node_writes.len());
            for write in node_writes {
                let key = write.key();
                match accounts.get(&key).map(encode_account).transpose() {
                    Ok(Some(payload)) => writes.push(ReplicaWrite::Put { key, payload }),
                    Ok(None) => writes.push(ReplicaWrite::Remove { key }),
                    Err(e) => error!(%key, error = %e, "cannot encode previous value"),
                }
            }
            restores.push((*node, writes));
        }
        restores
    }

    /// Copies the local accounts each cleared node owns back onto it.
    fn refill(&self, nodes: &[NodeId]) {
        let snapshot: Vec<Account> = self.accounts.read().values().copied().collect();
        for node in nodes {
            let mut writes = Vec::new();
            for account in &snapshot {
                if !self.router.remote_owners(account.id).contains(node) {
                    continue;
                }
                match encode_account(account) {
                    Ok(payload) => writes.push(ReplicaWrite::Put {
                        key: account.id,
                        payload,
                    }),
                    Err(e) => error!(key = %account.id, error = %e, "cannot encode account"),
                }
            }
            if !writes.is_empty() {
                self.send_restore(*node, writes);
            }
        }
    }

    fn send_restore(&self, node: NodeId, writes: Vec<ReplicaWrite>) {
        let message = ReplicationMessage::Restore { writes };
        if let Err(e) = self.transport.send(node, &message, self.replication_timeout) {
            error!(%node, error = %e, "restore failed, replica diverges from owners");
        }
    }
}

fn first_key(writes: &[ReplicaWrite]) -> AccountId {
    writes
        .first()
        .map_or(AccountId::new(0), ReplicaWrite::key)
}

impl std::fmt::Debug for ReplicatedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedStore")
            .field("router", &self.router)
            .field("accounts", &self.len())
            .finish_non_exhaustive()
    }
}
