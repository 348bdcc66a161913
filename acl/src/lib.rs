//! Access-control list storage and inheritance chains.
//!
//! Every node may carry an ACL: an ordered list of (authority,
//! permission, status) entries plus an inherit-from-parent flag. Nodes
//! without local entries share an ancestor's list instead of owning a
//! copy, and detach lazily on first write. [`AclStore`] holds the lists
//! and assignments; [`NodeGraph`] is the read-only view of the node tree
//! the chains are walked over.

pub mod error;
pub mod graph;
pub mod store;

pub use error::{AclError, Result};
pub use graph::{MemoryNodeGraph, NodeGraph};
pub use store::{AclId, AclKind, AclStore, EntryFilter};
