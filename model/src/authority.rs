//! Authority identifiers.
//!
//! An authority is the principal side of an access-control entry: a user,
//! a group (`GROUP_` prefix), a role (`ROLE_` prefix), or the wildcard
//! that matches every principal. User name comparison is case-insensitive
//! ("andy", "Andy" and "ANDY" denote the same authority), while group and
//! role identifiers compare verbatim. Equality and hashing fold user
//! names, so any map or set keyed by [`Authority`] collapses case
//! variants to a single entry.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Prefix identifying group authorities.
pub const GROUP_PREFIX: &str = "GROUP_";

/// Prefix identifying role authorities.
pub const ROLE_PREFIX: &str = "ROLE_";

/// The wildcard authority matching every principal.
pub const ALL_AUTHORITIES: &str = "ALL_AUTHORITIES";

/// The role held by every principal with a resolved identity.
pub const ROLE_AUTHENTICATED: &str = "ROLE_AUTHENTICATED";

/// Classification of an authority, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorityKind {
    User,
    Group,
    Role,
    /// The ALL_AUTHORITIES marker.
    Wildcard,
}

/// A user, group, role or wildcard authority identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authority {
    name: String,
}

impl Authority {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Validating constructor for names arriving from callers. Empty
    /// names and bare prefixes are rejected.
    pub fn parse(name: &str) -> Result<Self> {
        let bare = name == GROUP_PREFIX || name == ROLE_PREFIX;
        if name.trim().is_empty() || bare {
            return Err(ModelError::InvalidAuthority(format!("'{}'", name)));
        }
        Ok(Self::new(name))
    }

    /// Creates a group authority, adding the `GROUP_` prefix if absent.
    pub fn group(name: &str) -> Self {
        if name.starts_with(GROUP_PREFIX) {
            Self::new(name)
        } else {
            Self::new(format!("{GROUP_PREFIX}{name}"))
        }
    }

    /// The wildcard authority.
    pub fn everyone() -> Self {
        Self::new(ALL_AUTHORITIES)
    }

    /// The authenticated-principal role.
    pub fn authenticated_role() -> Self {
        Self::new(ROLE_AUTHENTICATED)
    }

    /// The spelling this authority was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AuthorityKind {
        if self.name == ALL_AUTHORITIES {
            AuthorityKind::Wildcard
        } else if self.name.starts_with(GROUP_PREFIX) {
            AuthorityKind::Group
        } else if self.name.starts_with(ROLE_PREFIX) {
            AuthorityKind::Role
        } else {
            AuthorityKind::User
        }
    }

    pub fn is_user(&self) -> bool {
        self.kind() == AuthorityKind::User
    }

    /// The identity key: case-folded for users, verbatim otherwise.
    fn key(&self) -> String {
        match self.kind() {
            AuthorityKind::User => self.name.to_lowercase(),
            _ => self.name.clone(),
        }
    }
}

impl PartialEq for Authority {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Authority {}

impl Hash for Authority {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
