//! Permission model and expansion registry.
//!
//! The model is a closed table of permissions: each permission may grant
//! a set of further permissions (e.g. `FullControl` grants `Read`,
//! `Write`, `Delete`, ...), and each node type names the permissions that
//! may be set on nodes of that type. The all-permissions wildcard (and
//! the deprecated legacy marker kept for old data) expands to everything
//! defined for the type context.
//!
//! The model can be loaded from a YAML document (see [`loader`]) or the
//! built-in default used for bootstrap and tests.

pub mod error;
pub mod loader;

use error::{RegistryError, Result};
use model::Permission;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A permission model document, as parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Namespace for every permission in this document.
    pub namespace: String,
    pub permissions: Vec<PermissionDefinition>,
    pub types: Vec<TypeDefinition>,
}

/// One permission in the model, with the permissions it directly grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDefinition {
    pub name: String,
    #[serde(default)]
    pub grants: Vec<String>,
}

/// A node type and the permissions settable on nodes of that type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub settable: Vec<String>,
}

/// The validated, queryable permission model.
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    namespace: String,
    /// Direct grants per defined permission; keys are the defined set.
    direct_grants: HashMap<Permission, Vec<Permission>>,
    /// Settable permissions per node type, in model order.
    types: HashMap<String, Vec<Permission>>,
}

impl PermissionRegistry {
    /// Validates a model document and builds the registry from it.
    ///
    /// Every name referenced in a `grants` list or a type's `settable`
    /// list must be defined, and grant chains must be acyclic.
    pub fn from_definition(definition: ModelDefinition) -> Result<Self> {
        let namespace = definition.namespace.clone();
        let defined: HashSet<String> = definition.permissions.iter().map(|p| p.name.clone()).collect();

        let mut direct_grants = HashMap::new();
        for perm in &definition.permissions {
            let permission = Permission::parse(&namespace, &perm.name)
                .map_err(|e| RegistryError::ModelParsing(e.to_string()))?;
            for grant in &perm.grants {
                if !defined.contains(grant) {
                    return Err(RegistryError::DanglingGrant(perm.name.clone(), grant.clone()));
                }
            }
            direct_grants.insert(
                permission,
                perm.grants.iter().map(|g| Permission::new(&namespace, g)).collect(),
            );
        }

        let mut types = HashMap::new();
        for ty in &definition.types {
            for name in &ty.settable {
                if !defined.contains(name) {
                    return Err(RegistryError::DanglingGrant(ty.name.clone(), name.clone()));
                }
            }
            types.insert(
                ty.name.clone(),
                ty.settable.iter().map(|n| Permission::new(&namespace, n)).collect(),
            );
        }

        let registry = Self {
            namespace,
            direct_grants,
            types,
        };
        registry.check_acyclic()?;
        debug!(
            "Built permission registry: {} permissions, {} types",
            registry.direct_grants.len(),
            registry.types.len()
        );
        Ok(registry)
    }

    /// The built-in permission model: read/write composites, FullControl,
    /// and a `base` node type exposing all of them.
    pub fn default_model() -> Self {
        let leaf = |name: &str| (Permission::named(name), Vec::new());
        let composite = |name: &str, grants: &[&str]| {
            (
                Permission::named(name),
                grants.iter().map(|g| Permission::named(*g)).collect::<Vec<_>>(),
            )
        };

        let direct_grants: HashMap<_, _> = [
            leaf("ReadProperties"),
            leaf("ReadChildren"),
            leaf("ReadContent"),
            composite("Read", &["ReadProperties", "ReadChildren", "ReadContent"]),
            leaf("WriteProperties"),
            leaf("WriteContent"),
            composite("Write", &["WriteProperties", "WriteContent"]),
            leaf("Delete"),
            leaf("AddChildren"),
            leaf("CancelCheckOut"),
            composite(
                "FullControl",
                &["Read", "Write", "Delete", "AddChildren", "CancelCheckOut"],
            ),
        ]
        .into_iter()
        .collect();

        let base: Vec<Permission> = [
            "Read",
            "ReadProperties",
            "ReadChildren",
            "ReadContent",
            "Write",
            "WriteProperties",
            "WriteContent",
            "Delete",
            "AddChildren",
            "CancelCheckOut",
            "FullControl",
        ]
        .iter()
        .map(|n| Permission::named(*n))
        .collect();

        Self {
            namespace: model::DEFAULT_NAMESPACE.to_string(),
            direct_grants,
            types: HashMap::from([("base".to_string(), base)]),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// True for defined permissions and for both wildcard markers.
    pub fn is_defined(&self, permission: &Permission) -> bool {
        permission.is_all() || self.direct_grants.contains_key(permission)
    }

    /// Replaces the legacy wildcard marker with the current one.
    pub fn canonical(&self, permission: &Permission) -> Permission {
        if permission.is_all() {
            Permission::all()
        } else {
            permission.clone()
        }
    }

    /// The transitive closure of what `permission` grants, excluding
    /// itself. The wildcard grants every defined permission.
    pub fn grantees(&self, permission: &Permission) -> Result<Vec<Permission>> {
        if permission.is_all() {
            let mut all: Vec<Permission> = self.direct_grants.keys().cloned().collect();
            all.sort();
            return Ok(all);
        }
        let direct = self
            .direct_grants
            .get(permission)
            .ok_or_else(|| RegistryError::UnknownPermission(permission.to_string()))?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<Permission> = direct.clone();
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(grants) = self.direct_grants.get(&next) {
                stack.extend(grants.iter().cloned());
            }
            out.push(next);
        }
        Ok(out)
    }

    /// Every permission whose closure contains `permission`, plus the
    /// permission itself and both wildcard markers. An entry carrying any
    /// member of this set satisfies a check for `permission`.
    pub fn granting(&self, permission: &Permission) -> Result<Vec<Permission>> {
        let mut out = Vec::new();
        if !permission.is_all() {
            if !self.direct_grants.contains_key(permission) {
                return Err(RegistryError::UnknownPermission(permission.to_string()));
            }
            out.push(permission.clone());
            for candidate in self.direct_grants.keys() {
                if candidate != permission && self.grantees(candidate)?.contains(permission) {
                    out.push(candidate.clone());
                }
            }
        }
        out.push(Permission::all());
        out.push(Permission::legacy_all());
        Ok(out)
    }

    /// Ordered expansion of a requested permission: the permission itself
    /// followed by everything it grants. The wildcard expands to every
    /// permission defined for the node type context.
    pub fn expand(&self, permission: &Permission, node_type: &str) -> Result<Vec<Permission>> {
        if permission.is_all() {
            return self.defined_for_type(node_type);
        }
        let mut out = vec![permission.clone()];
        out.extend(self.grantees(permission)?);
        Ok(out)
    }

    /// The permissions settable on nodes of the given type, in model order.
    pub fn settable(&self, node_type: &str) -> Result<Vec<Permission>> {
        self.types
            .get(node_type)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(node_type.to_string()))
    }

    /// The settable permissions for a type plus everything they grant.
    pub fn defined_for_type(&self, node_type: &str) -> Result<Vec<Permission>> {
        let settable = self.settable(node_type)?;
        let mut seen: HashSet<Permission> = HashSet::new();
        let mut out = Vec::new();
        for perm in settable {
            let grantees = self.grantees(&perm)?;
            if seen.insert(perm.clone()) {
                out.push(perm);
            }
            for grantee in grantees {
                if seen.insert(grantee.clone()) {
                    out.push(grantee);
                }
            }
        }
        Ok(out)
    }

    fn check_acyclic(&self) -> Result<()> {
        // A cycle would make grantees() loop forever without the seen
        // set; with it, a cycle silently drops entries. Reject up front.
        for start in self.direct_grants.keys() {
            let mut stack: Vec<Permission> = self.direct_grants[start].clone();
            let mut seen = HashSet::new();
            while let Some(next) = stack.pop() {
                if &next == start {
                    return Err(RegistryError::GrantCycle(start.to_string()));
                }
                if !seen.insert(next.clone()) {
                    continue;
                }
                if let Some(grants) = self.direct_grants.get(&next) {
                    stack.extend(grants.iter().cloned());
                }
            }
        }
        Ok(())
    }
}
