//! Memoized access verdicts.
//!
//! Evaluating a permission walks the ancestor chain and expands group
//! memberships, so repeated checks on the same (caller, node,
//! permission) triple are cached. A cached verdict is only valid while
//! everything it was derived from still holds, so the key carries the
//! caller's authorisation-set fingerprint and the resolver generation:
//! a membership change bumps the generation and silently strands every
//! older entry, while ACL and tree changes invalidate by node or by
//! subtree.

pub mod error;

use acl::NodeGraph;
use error::Result;
use model::{AccessStatus, NodeId, Permission};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, info};

/// Everything a verdict depends on.
///
/// Two callers with identical authorisation sets share entries through
/// the fingerprint; a caller whose memberships changed stops matching
/// through the generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerdictKey {
    pub node: NodeId,
    pub permission: Permission,
    pub fingerprint: u64,
    pub generation: u64,
}

/// Statistics about the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Default)]
struct CacheInner {
    verdicts: HashMap<VerdictKey, AccessStatus>,
    // Per-node key index so invalidation never scans the whole map.
    by_node: HashMap<NodeId, HashSet<VerdictKey>>,
    invalidations: u64,
}

/// In-memory verdict cache.
///
/// Lookups hold only the read lock; the hit/miss counters are atomics,
/// so parallel evaluators contend only with writers.
pub struct VerdictCache {
    inner: RwLock<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    capacity: usize,
}

/// Entry count at which the cache is flushed wholesale.
const DEFAULT_CAPACITY: usize = 65_536;

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl VerdictCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &VerdictKey) -> Option<AccessStatus> {
        let found = {
            let inner = self.read();
            inner.verdicts.get(key).copied()
        };
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn put(&self, key: VerdictKey, status: AccessStatus) {
        let mut inner = self.write();
        if inner.verdicts.len() >= self.capacity && !inner.verdicts.contains_key(&key) {
            // Full flush beats an eviction policy here: verdicts are
            // cheap to recompute and the bound exists to cap memory.
            info!("Verdict cache at capacity ({}), flushing", self.capacity);
            inner.verdicts.clear();
            inner.by_node.clear();
        }
        inner.by_node.entry(key.node).or_default().insert(key.clone());
        inner.verdicts.insert(key, status);
    }

    /// Drop every verdict computed on one node.
    pub fn invalidate_node(&self, node: NodeId) -> usize {
        let mut inner = self.write();
        inner.remove_node(node)
    }

    /// Drop every verdict computed on `root` or a descendant.
    ///
    /// Cached nodes are sparse relative to the tree, so this walks each
    /// cached node's parent chain upward looking for `root` instead of
    /// fanning out over the subtree's children.
    pub fn invalidate_subtree(&self, root: NodeId, graph: &dyn NodeGraph) -> Result<usize> {
        let cached_nodes: Vec<NodeId> = {
            let inner = self.read();
            inner.by_node.keys().copied().collect()
        };

        let mut affected = Vec::new();
        for node in cached_nodes {
            if node == root || Self::has_ancestor(node, root, graph)? {
                affected.push(node);
            }
        }

        let mut inner = self.write();
        let mut dropped = 0;
        for node in affected {
            dropped += inner.remove_node(node);
        }
        debug!("Subtree invalidation under {} dropped {} verdicts", root, dropped);
        Ok(dropped)
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.write();
        let count = inner.verdicts.len();
        inner.verdicts.clear();
        inner.by_node.clear();
        inner.invalidations += count as u64;
        info!("Cleared {} cached verdicts", count);
        count
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.read();
        CacheStats {
            entries: inner.verdicts.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: inner.invalidations,
        }
    }

    fn has_ancestor(node: NodeId, ancestor: NodeId, graph: &dyn NodeGraph) -> Result<bool> {
        let mut current = node;
        // A node removed from the graph still has stale verdicts; treat
        // it as outside every subtree and let node invalidation handle it.
        if !graph.exists(current) {
            return Ok(false);
        }
        while let Some(parent) = graph.parent(current)? {
            if parent == ancestor {
                return Ok(true);
            }
            current = parent;
        }
        Ok(false)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheInner {
    fn remove_node(&mut self, node: NodeId) -> usize {
        match self.by_node.remove(&node) {
            Some(keys) => {
                let count = keys.len();
                for key in keys {
                    self.verdicts.remove(&key);
                }
                self.invalidations += count as u64;
                count
            }
            None => 0,
        }
    }
}

/// Thread-safe cache manager for async callers.
pub struct CacheManager {
    cache: Arc<AsyncRwLock<VerdictCache>>,
}

impl CacheManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Arc::new(AsyncRwLock::new(VerdictCache::new(capacity))),
        }
    }

    pub async fn get(&self, key: &VerdictKey) -> Option<AccessStatus> {
        let cache = self.cache.read().await;
        cache.get(key)
    }

    pub async fn put(&self, key: VerdictKey, status: AccessStatus) {
        let cache = self.cache.read().await;
        cache.put(key, status)
    }

    pub async fn invalidate_node(&self, node: NodeId) -> usize {
        let cache = self.cache.write().await;
        cache.invalidate_node(node)
    }

    pub async fn invalidate_subtree(&self, root: NodeId, graph: &dyn NodeGraph) -> Result<usize> {
        let cache = self.cache.write().await;
        cache.invalidate_subtree(root, graph)
    }

    pub async fn clear(&self) -> usize {
        let cache = self.cache.write().await;
        cache.clear()
    }

    pub async fn stats(&self) -> CacheStats {
        let cache = self.cache.read().await;
        cache.stats()
    }
}
