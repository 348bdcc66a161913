//! Core data model for the node permission engine.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: permissions (namespaced qualified names), authorities
//! (users, groups, roles and the two wildcard markers), access statuses,
//! and the access-control entry shapes used for storage and reporting.
//!
//! The types here carry no behavior beyond identity and classification;
//! expansion (which permission implies which) lives in the `registry`
//! crate, and membership resolution lives in `authority`.

pub mod authority;
pub mod entry;
pub mod error;
pub mod permission;

pub use authority::{Authority, AuthorityKind, ALL_AUTHORITIES, GROUP_PREFIX, ROLE_AUTHENTICATED, ROLE_PREFIX};
pub use entry::{AccessControlEntry, AccessStatus, AclEntry};
pub use error::{ModelError, Result};
pub use permission::{Permission, ALL_PERMISSIONS, DEFAULT_NAMESPACE};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a node in the repository tree.
///
/// The node graph itself (parents, children, existence) is an external
/// collaborator; this engine only ever holds node identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(42).to_string(), "node:42");
    }

    #[test]
    fn test_node_id_ordering() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(NodeId(7), NodeId(7));
    }
}
