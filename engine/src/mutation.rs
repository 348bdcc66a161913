//! The write side of the permission service.
//!
//! Every mutation follows the same shape: refuse outside an active
//! transaction, apply the store write under bounded optimistic retry,
//! notify the sink synchronously, then drop affected cached verdicts.
//! The write lands before the sink fires, so a caller re-checking inside
//! its own transaction sees the change immediately.

use crate::error::{EngineError, Result};
use crate::traits::{NotificationSink, TransactionContext};
use acl::{AclError, AclStore, EntryFilter, NodeGraph};
use model::{AccessStatus, Authority, NodeId, Permission};
use std::sync::Arc;
use tracing::{debug, warn};
use verdict_cache::VerdictCache;

/// Attempts per write before giving up on version conflicts.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Applies permission mutations and keeps the cache and sink in step.
pub struct MutationGateway {
    store: Arc<AclStore>,
    graph: Arc<dyn NodeGraph>,
    cache: Arc<VerdictCache>,
    sink: Arc<dyn NotificationSink>,
    txn: Arc<dyn TransactionContext>,
    batch_size: usize,
}

impl MutationGateway {
    pub fn new(
        store: Arc<AclStore>,
        graph: Arc<dyn NodeGraph>,
        cache: Arc<VerdictCache>,
        sink: Arc<dyn NotificationSink>,
        txn: Arc<dyn TransactionContext>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            graph,
            cache,
            sink,
            txn,
            batch_size,
        }
    }

    pub fn set_permission(
        &self,
        node: NodeId,
        authority: &Authority,
        permission: &Permission,
        status: AccessStatus,
    ) -> Result<()> {
        self.require_transaction()?;
        self.with_retries(node, |version| {
            self.store.set_entry(node, authority, permission, status, version)
        })?;
        self.sink
            .on_grant(node, authority, permission, status)
            .map_err(EngineError::Notification)?;
        self.cache.invalidate_subtree(node, self.graph.as_ref())?;
        Ok(())
    }

    pub fn delete_permission(
        &self,
        node: NodeId,
        authority: Option<&Authority>,
        permission: Option<&Permission>,
    ) -> Result<usize> {
        self.require_transaction()?;
        let filter = match (authority, permission) {
            (Some(a), Some(p)) => EntryFilter::Exact(a.clone(), p.clone()),
            (Some(a), None) => EntryFilter::ByAuthority(a.clone()),
            (None, Some(p)) => EntryFilter::ByPermission(p.clone()),
            (None, None) => EntryFilter::All,
        };
        let removed = self.with_retries(node, |version| {
            self.store.delete_entries(node, &filter, version)
        })?;
        self.sink
            .on_revoke(node, authority, permission)
            .map_err(EngineError::Notification)?;
        self.cache.invalidate_subtree(node, self.graph.as_ref())?;
        Ok(removed)
    }

    /// The inherit toggle. With `batched` the subtree cache fixup walks
    /// descendants in bounded batches instead of one sweep; the store
    /// change and the notification are identical either way.
    pub fn set_inherit_parent_permissions(
        &self,
        node: NodeId,
        inherits: bool,
        batched: bool,
    ) -> Result<()> {
        self.require_transaction()?;
        self.with_retries(node, |version| {
            self.store.set_inherits(node, inherits, version)
        })?;
        self.sink
            .on_inherit_changed(node, inherits)
            .map_err(EngineError::Notification)?;
        if batched {
            self.invalidate_descendants_batched(node)?;
        } else {
            self.cache.invalidate_subtree(node, self.graph.as_ref())?;
        }
        Ok(())
    }

    /// Reaction to a node move that already happened in the graph:
    /// repoint shared assignments below it and drop the subtree's
    /// cached verdicts, which were computed against the old chain.
    pub fn on_node_moved(&self, node: NodeId) -> Result<()> {
        self.require_transaction()?;
        self.store.reassign_subtree(node, self.graph.as_ref(), self.batch_size)?;
        self.cache.invalidate_subtree(node, self.graph.as_ref())?;
        debug!("Rewired permissions after move of {}", node);
        Ok(())
    }

    /// Reaction to a node deletion: drop its assignment and verdicts.
    /// The graph no longer knows the node, so subtree cleanup happened
    /// through the children before the parent was removed.
    pub fn on_node_deleted(&self, node: NodeId) -> Result<()> {
        self.require_transaction()?;
        self.store.unassign(node);
        self.cache.invalidate_node(node);
        Ok(())
    }

    fn require_transaction(&self) -> Result<()> {
        if self.txn.is_active() {
            Ok(())
        } else {
            Err(EngineError::NoTransaction)
        }
    }

    /// Re-reads the version and re-applies the write on conflict, a
    /// bounded number of times.
    fn with_retries<T, F>(&self, node: NodeId, mut op: F) -> Result<T>
    where
        F: FnMut(u64) -> acl::Result<T>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let version = self.store.version_of(node)?;
            match op(version) {
                Ok(value) => return Ok(value),
                Err(AclError::ConcurrentModification { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        "Concurrent ACL modification on {}, retrying ({}/{})",
                        node, attempt, MAX_WRITE_ATTEMPTS
                    );
                }
                Err(err @ AclError::ConcurrentModification { .. }) => {
                    warn!("Concurrent ACL modification on {}, giving up: {}", node, err);
                    return Err(EngineError::RetriesExhausted(MAX_WRITE_ATTEMPTS));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(EngineError::RetriesExhausted(MAX_WRITE_ATTEMPTS))
    }

    fn invalidate_descendants_batched(&self, root: NodeId) -> Result<usize> {
        let mut queue = vec![root];
        let mut dropped = 0usize;
        while !queue.is_empty() {
            let batch: Vec<NodeId> = queue.drain(..queue.len().min(self.batch_size)).collect();
            for node in &batch {
                dropped += self.cache.invalidate_node(*node);
                queue.extend(self.graph.children(*node)?);
            }
        }
        Ok(dropped)
    }
}
