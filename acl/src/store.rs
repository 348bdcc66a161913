//! The access-control list store.
//!
//! ACLs live in an arena addressed by stable [`AclId`]s; nodes store an
//! id plus their relationship to it ([`AclKind::Defining`] for a list
//! the node owns, [`AclKind::Shared`] for a pointer at another node's
//! list). The first defining operation on a sharing node clones the list
//! privately (copy-on-write), so concurrent readers following the old id
//! always observe a whole ACL.
//!
//! Mutations are optimistic: each takes the ACL version the caller last
//! read, and a stale version fails with
//! [`AclError::ConcurrentModification`] for the gateway to retry.

use crate::error::{AclError, Result};
use crate::graph::NodeGraph;
use model::{AccessControlEntry, AccessStatus, AclEntry, Authority, NodeId, Permission};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Ancestor chains deeper than this indicate a cycle in the graph.
const MAX_CHAIN_DEPTH: u32 = 128;

/// Stable arena address of an ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclId(pub u64);

impl fmt::Display for AclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acl:{}", self.0)
    }
}

/// A node's relationship to its ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AclKind {
    /// The node owns the list exclusively.
    Defining,
    /// The node points at a list owned elsewhere.
    Shared,
}

/// How [`AclStore::delete_entries`] selects entries.
#[derive(Debug, Clone)]
pub enum EntryFilter {
    /// One exact (authority, permission) pair.
    Exact(Authority, Permission),
    /// Every entry for an authority.
    ByAuthority(Authority),
    /// Every entry for a permission, across authorities.
    ByPermission(Permission),
    /// Every entry on the node.
    All,
}

#[derive(Debug, Clone)]
struct Acl {
    entries: Vec<AclEntry>,
    inherits: bool,
    version: u64,
}

impl Acl {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            inherits: true,
            version: 0,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    arena: HashMap<AclId, Arc<Acl>>,
    assignment: HashMap<NodeId, (AclId, AclKind)>,
    next_id: u64,
}

/// The per-node ACL records and their sharing relationships.
#[derive(Default)]
pub struct AclStore {
    inner: RwLock<StoreInner>,
}

impl AclStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acl_id_of(&self, node: NodeId) -> Option<AclId> {
        let inner = self.read();
        inner.assignment.get(&node).map(|(id, _)| *id)
    }

    pub fn kind_of(&self, node: NodeId) -> Option<AclKind> {
        let inner = self.read();
        inner.assignment.get(&node).map(|(_, kind)| *kind)
    }

    /// The node's directly visible entries (empty when it has no ACL).
    pub fn entries_of(&self, node: NodeId) -> Result<Vec<AclEntry>> {
        let inner = self.read();
        match inner.acl_of(node)? {
            Some(acl) => Ok(acl.entries.clone()),
            None => Ok(Vec::new()),
        }
    }

    /// Whether the node inherits from its parent. Nodes without an ACL
    /// inherit transparently.
    pub fn inherits(&self, node: NodeId) -> Result<bool> {
        let inner = self.read();
        Ok(inner.acl_of(node)?.map(|acl| acl.inherits).unwrap_or(true))
    }

    /// The version an optimistic mutation should pass back; 0 for a node
    /// with no ACL yet.
    pub fn version_of(&self, node: NodeId) -> Result<u64> {
        let inner = self.read();
        Ok(inner.acl_of(node)?.map(|acl| acl.version).unwrap_or(0))
    }

    /// Set or overwrite one entry. Creates a defining ACL lazily and
    /// detaches from a shared one first. The (authority, permission)
    /// pair stays unique: repeated sets only overwrite the status, and
    /// the spelling the authority was first stored under is kept.
    pub fn set_entry(
        &self,
        node: NodeId,
        authority: &Authority,
        permission: &Permission,
        status: AccessStatus,
        expected_version: u64,
    ) -> Result<()> {
        let mut inner = self.write();
        let mut acl = inner.defining_acl(node, expected_version)?;

        match acl.entries.iter_mut().find(|e| e.same_pair(authority, permission)) {
            Some(existing) => existing.status = status,
            None => acl
                .entries
                .push(AclEntry::new(authority.clone(), permission.clone(), status)),
        }
        debug!("Set {} {} = {} on {}", authority, permission, status, node);
        inner.commit(node, acl);
        Ok(())
    }

    /// Delete entries matching the filter; returns how many were
    /// removed. Deleting what is absent is a no-op, not an error.
    pub fn delete_entries(&self, node: NodeId, filter: &EntryFilter, expected_version: u64) -> Result<usize> {
        let mut inner = self.write();
        if inner.acl_of(node)?.is_none() {
            return Ok(0);
        }
        let mut acl = inner.defining_acl(node, expected_version)?;
        let before = acl.entries.len();
        acl.entries.retain(|e| !filter.matches(e));
        let removed = before - acl.entries.len();
        debug!("Deleted {} entries on {}", removed, node);
        inner.commit(node, acl);
        Ok(removed)
    }

    /// Toggle inheritance, creating an empty defining ACL if needed.
    pub fn set_inherits(&self, node: NodeId, inherits: bool, expected_version: u64) -> Result<()> {
        let mut inner = self.write();
        let mut acl = inner.defining_acl(node, expected_version)?;
        acl.inherits = inherits;
        debug!("Set inherits = {} on {}", inherits, node);
        inner.commit(node, acl);
        Ok(())
    }

    /// Point `node` at `source`'s ACL (the shared strategy). The source
    /// must have an ACL.
    pub fn share_from(&self, node: NodeId, source: NodeId) -> Result<AclId> {
        let mut inner = self.write();
        let (id, _) = *inner.assignment.get(&source).ok_or(AclError::MissingAcl(source))?;
        inner.assignment.insert(node, (id, AclKind::Shared));
        Ok(id)
    }

    /// Drop a deleted node's assignment, freeing its ACL when it was the
    /// last owner.
    pub fn unassign(&self, node: NodeId) {
        let mut inner = self.write();
        if let Some((id, _)) = inner.assignment.remove(&node) {
            let still_referenced = inner.assignment.values().any(|(other, _)| *other == id);
            if !still_referenced {
                inner.arena.remove(&id);
                debug!("Dropped orphaned {}", id);
            }
        }
    }

    /// Flattened entries visible from `node`: its own ACL plus ancestors
    /// while inheritance holds, stopping inclusively at the first
    /// non-inheriting defining ACL. Ordered closest-first; position is
    /// the hop count up the parent chain.
    ///
    /// Shared assignments are pointers at a defining list further up the
    /// chain; their entries are emitted once, at the owner's position,
    /// so the walk skips over them.
    pub fn chain_entries(&self, node: NodeId, graph: &dyn NodeGraph) -> Result<Vec<AccessControlEntry>> {
        let inner = self.read();
        let mut out = Vec::new();
        let mut current = node;
        let mut hops: u32 = 0;
        loop {
            if hops > MAX_CHAIN_DEPTH {
                warn!("Ancestor chain from {} exceeds {} hops", node, MAX_CHAIN_DEPTH);
                return Err(AclError::InconsistentChain(
                    node,
                    format!("chain deeper than {} hops", MAX_CHAIN_DEPTH),
                ));
            }
            if let Some((id, kind)) = inner.assignment.get(&current).copied() {
                let acl = inner.arena.get(&id).ok_or(AclError::MissingAcl(current))?;
                if kind == AclKind::Defining {
                    out.extend(
                        acl.entries
                            .iter()
                            .map(|entry| AccessControlEntry::from_stored(entry, hops)),
                    );
                    if !acl.inherits {
                        break;
                    }
                }
            }
            match graph.parent(current)? {
                Some(parent) => {
                    current = parent;
                    hops += 1;
                }
                None => break,
            }
        }
        Ok(out)
    }

    /// After `root` moved, repoint shared assignments in its subtree at
    /// the nearest ACL on the new ancestor chain. Descendants owning a
    /// defining ACL are untouched. Work proceeds in bounded batches so a
    /// large fan-out never becomes one long critical section.
    pub fn reassign_subtree(&self, root: NodeId, graph: &dyn NodeGraph, batch_size: usize) -> Result<usize> {
        let batch_size = batch_size.max(1);
        let mut queue = vec![root];
        let mut repointed = 0usize;
        while !queue.is_empty() {
            let batch: Vec<NodeId> = queue.drain(..queue.len().min(batch_size)).collect();
            {
                let mut inner = self.write();
                for node in &batch {
                    if let Some((_, AclKind::Shared)) = inner.assignment.get(node) {
                        match Self::nearest_ancestor_acl(&inner, *node, graph)? {
                            Some(target) => {
                                inner.assignment.insert(*node, (target, AclKind::Shared));
                            }
                            None => {
                                inner.assignment.remove(node);
                            }
                        }
                        repointed += 1;
                    }
                }
            }
            for node in &batch {
                queue.extend(graph.children(*node)?);
            }
        }
        if repointed > 0 {
            debug!("Repointed {} shared assignments under {}", repointed, root);
        }
        Ok(repointed)
    }

    fn nearest_ancestor_acl(inner: &StoreInner, node: NodeId, graph: &dyn NodeGraph) -> Result<Option<AclId>> {
        let mut current = node;
        let mut hops = 0u32;
        while let Some(parent) = graph.parent(current)? {
            hops += 1;
            if hops > MAX_CHAIN_DEPTH {
                return Err(AclError::InconsistentChain(
                    node,
                    format!("ancestor walk deeper than {} hops", MAX_CHAIN_DEPTH),
                ));
            }
            if let Some((id, _)) = inner.assignment.get(&parent) {
                return Ok(Some(*id));
            }
            current = parent;
        }
        Ok(None)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl StoreInner {
    fn acl_of(&self, node: NodeId) -> Result<Option<&Arc<Acl>>> {
        match self.assignment.get(&node) {
            Some((id, _)) => self.arena.get(id).map(Some).ok_or(AclError::MissingAcl(node)),
            None => Ok(None),
        }
    }

    /// Produce a private, mutable copy of the node's ACL, verifying the
    /// expected version and detaching from a shared list if necessary.
    /// The copy becomes visible only through [`StoreInner::commit`].
    fn defining_acl(&mut self, node: NodeId, expected_version: u64) -> Result<Acl> {
        let found = match self.assignment.get(&node) {
            Some((id, _)) => self.arena.get(id).ok_or(AclError::MissingAcl(node))?.version,
            None => 0,
        };
        if found != expected_version {
            return Err(AclError::ConcurrentModification {
                node,
                expected: expected_version,
                found,
            });
        }

        match self.assignment.get(&node).copied() {
            None => {
                let id = self.allocate();
                self.assignment.insert(node, (id, AclKind::Defining));
                self.arena.insert(id, Arc::new(Acl::empty()));
                Ok(Acl::empty())
            }
            Some((id, AclKind::Shared)) => {
                // Copy-on-write detachment. Readers keep the old id.
                let copy = (**self.arena.get(&id).ok_or(AclError::MissingAcl(node))?).clone();
                let new_id = self.allocate();
                self.assignment.insert(node, (new_id, AclKind::Defining));
                self.arena.insert(new_id, Arc::new(copy.clone()));
                debug!("Detached {} from {} as {}", node, id, new_id);
                Ok(copy)
            }
            Some((id, AclKind::Defining)) => {
                Ok((**self.arena.get(&id).ok_or(AclError::MissingAcl(node))?).clone())
            }
        }
    }

    /// Swap the node's ACL for the mutated copy with a bumped version.
    fn commit(&mut self, node: NodeId, mut acl: Acl) {
        if let Some((id, _)) = self.assignment.get(&node).copied() {
            acl.version += 1;
            self.arena.insert(id, Arc::new(acl));
        }
    }

    fn allocate(&mut self) -> AclId {
        self.next_id += 1;
        AclId(self.next_id)
    }
}

impl EntryFilter {
    fn matches(&self, entry: &AclEntry) -> bool {
        match self {
            EntryFilter::Exact(authority, permission) => entry.same_pair(authority, permission),
            EntryFilter::ByAuthority(authority) => &entry.authority == authority,
            EntryFilter::ByPermission(permission) => &entry.permission == permission,
            EntryFilter::All => true,
        }
    }
}
