//! Access-control entry shapes.
//!
//! [`AclEntry`] is the stored form: (authority, permission, status) with
//! the unique-pair invariant enforced by the ACL store. The position of
//! an entry relative to a queried node is a property of the chain walk,
//! not of storage, so the flattened reporting form
//! [`AccessControlEntry`] carries it separately.

use crate::{Authority, Permission};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The verdict of an access check, and the polarity of a stored entry.
///
/// There is deliberately no third state: callers always receive a
/// definitive answer or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessStatus {
    Allowed,
    Denied,
}

impl AccessStatus {
    pub fn is_allowed(self) -> bool {
        self == AccessStatus::Allowed
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessStatus::Allowed => write!(f, "ALLOWED"),
            AccessStatus::Denied => write!(f, "DENIED"),
        }
    }
}

/// An entry as stored in an access-control list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub authority: Authority,
    pub permission: Permission,
    pub status: AccessStatus,
}

impl AclEntry {
    pub fn new(authority: Authority, permission: Permission, status: AccessStatus) -> Self {
        Self {
            authority,
            permission,
            status,
        }
    }

    /// True when this entry is for the same (authority, permission) pair,
    /// under the authority's own case rules.
    pub fn same_pair(&self, authority: &Authority, permission: &Permission) -> bool {
        &self.authority == authority && &self.permission == permission
    }
}

/// A flattened entry as seen from a particular node: the stored tuple
/// plus how many inheritance hops away it was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    pub authority: Authority,
    pub permission: Permission,
    pub status: AccessStatus,
    /// 0 = set directly on the queried node.
    pub position: u32,
}

impl AccessControlEntry {
    pub fn from_stored(entry: &AclEntry, position: u32) -> Self {
        Self {
            authority: entry.authority.clone(),
            permission: entry.permission.clone(),
            status: entry.status,
            position,
        }
    }

    /// Entries at position > 0 came through inheritance.
    pub fn inherited(&self) -> bool {
        self.position > 0
    }
}

impl fmt::Display for AccessControlEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} (+{})",
            self.status, self.permission, self.authority, self.position
        )
    }
}
