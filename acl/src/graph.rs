//! The node graph collaborator.
//!
//! The engine never owns the repository tree; it only reads parent and
//! child links through [`NodeGraph`]. Moves happen in the graph's owner,
//! which then notifies the engine so sharing assignments and cached
//! verdicts can be fixed up.

use crate::error::{AclError, Result};
use model::NodeId;
use std::collections::HashMap;
use std::sync::RwLock;

/// Read access to the repository node tree.
pub trait NodeGraph: Send + Sync {
    /// The primary parent, or `None` at a root.
    fn parent(&self, node: NodeId) -> Result<Option<NodeId>>;

    /// Direct children, used for subtree fan-out after moves.
    fn children(&self, node: NodeId) -> Result<Vec<NodeId>>;

    fn exists(&self, node: NodeId) -> bool;
}

/// An in-memory node tree for wiring and tests.
#[derive(Default)]
pub struct MemoryNodeGraph {
    inner: RwLock<GraphInner>,
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<NodeId, NodeRecord>,
    next: u64,
}

struct NodeRecord {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl MemoryNodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&self) -> NodeId {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.insert(None)
    }

    pub fn add_child(&self, parent: NodeId) -> Result<NodeId> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !inner.nodes.contains_key(&parent) {
            return Err(AclError::UnknownNode(parent));
        }
        let child = inner.insert(Some(parent));
        if let Some(record) = inner.nodes.get_mut(&parent) {
            record.children.push(child);
        }
        Ok(child)
    }

    /// Re-parent a node. The caller is responsible for notifying the
    /// permission engine afterwards.
    pub fn move_node(&self, node: NodeId, new_parent: NodeId) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !inner.nodes.contains_key(&node) {
            return Err(AclError::UnknownNode(node));
        }
        if !inner.nodes.contains_key(&new_parent) {
            return Err(AclError::UnknownNode(new_parent));
        }
        let old_parent = inner.nodes[&node].parent;
        if let Some(old) = old_parent {
            if let Some(record) = inner.nodes.get_mut(&old) {
                record.children.retain(|c| *c != node);
            }
        }
        if let Some(record) = inner.nodes.get_mut(&node) {
            record.parent = Some(new_parent);
        }
        if let Some(record) = inner.nodes.get_mut(&new_parent) {
            record.children.push(node);
        }
        Ok(())
    }

    pub fn remove_node(&self, node: NodeId) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let record = inner.nodes.remove(&node).ok_or(AclError::UnknownNode(node))?;
        if let Some(parent) = record.parent {
            if let Some(parent_record) = inner.nodes.get_mut(&parent) {
                parent_record.children.retain(|c| *c != node);
            }
        }
        Ok(())
    }
}

impl GraphInner {
    fn insert(&mut self, parent: Option<NodeId>) -> NodeId {
        self.next += 1;
        let id = NodeId(self.next);
        self.nodes.insert(
            id,
            NodeRecord {
                parent,
                children: Vec::new(),
            },
        );
        id
    }
}

impl NodeGraph for MemoryNodeGraph {
    fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .nodes
            .get(&node)
            .map(|r| r.parent)
            .ok_or(AclError::UnknownNode(node))
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .nodes
            .get(&node)
            .map(|r| r.children.clone())
            .ok_or(AclError::UnknownNode(node))
    }

    fn exists(&self, node: NodeId) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.nodes.contains_key(&node)
    }
}
