//! Permission identifiers.
//!
//! A permission is a namespaced qualified name plus a local name, e.g.
//! `{repo.permissions}Read`. Equality is by (namespace, name). Two
//! universal markers exist: the current all-permissions wildcard and a
//! deprecated legacy alias (same local name, empty namespace) that must
//! behave identically for access checks.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace under which the built-in permission model is defined.
pub const DEFAULT_NAMESPACE: &str = "repo.permissions";

/// Local name of the all-permissions wildcard.
pub const ALL_PERMISSIONS: &str = "All";

/// A namespaced permission reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    namespace: String,
    name: String,
}

impl Permission {
    /// Creates a permission with an explicit namespace.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a permission in the default namespace.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }

    /// Validating constructor for names coming from external documents.
    /// The namespace may be empty (the legacy wildcard uses that); the
    /// local name may not.
    pub fn parse(namespace: &str, name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(ModelError::InvalidPermission(format!(
                "empty name in namespace '{}'",
                namespace
            )));
        }
        Ok(Self::new(namespace, name))
    }

    /// The all-permissions wildcard.
    pub fn all() -> Self {
        Self::named(ALL_PERMISSIONS)
    }

    /// The deprecated all-permissions marker kept for data written by
    /// earlier releases. Checks must treat it exactly like [`Permission::all`].
    pub fn legacy_all() -> Self {
        Self::new("", ALL_PERMISSIONS)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for both the current and the legacy all-permissions markers.
    pub fn is_all(&self) -> bool {
        self.name == ALL_PERMISSIONS && (self.namespace == DEFAULT_NAMESPACE || self.namespace.is_empty())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.name)
        }
    }
}
