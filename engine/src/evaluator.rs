//! The access verdict algorithm.
//!
//! A check asks whether a caller holds a permission on a node. After the
//! short-circuits (absent node or permission, system and admin callers),
//! the evaluator flattens the node's inheritance chain closest-first and
//! scans it twice: a deny pass, where a denial fires unless an earlier
//! entry for the same authority already allowed something covering the
//! required permission, and a grant pass with the roles reversed. Under
//! the `any_deny_denies` policy the deny pass runs first and wins; with
//! it off, only the grant pass runs and a denial merely masks later
//! grants for its authority.

use crate::error::Result;
use acl::{AclStore, NodeGraph};
use authority::{AuthorityResolver, CallerContext};
use model::{AccessStatus, Authority, NodeId, Permission};
use registry::error::RegistryError;
use registry::PermissionRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use verdict_cache::{VerdictCache, VerdictKey};

/// Decision policy, threaded in at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// When true, a surviving denial anywhere on the chain wins over any
    /// grant. When false, a grant wins unless a denial is closer.
    pub any_deny_denies: bool,
    /// Permissions denied even to administrators. System is exempt.
    pub admin_denied: HashSet<Permission>,
    /// Node type used to expand the all-permissions wildcard.
    pub type_context: String,
    /// Batch size for subtree fixups after structural changes.
    pub batch_size: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            any_deny_denies: true,
            admin_denied: HashSet::from([Permission::named("CancelCheckOut")]),
            type_context: "base".to_string(),
            batch_size: 256,
        }
    }
}

/// Evaluates permission checks against the ACL chain.
pub struct PermissionEvaluator {
    registry: Arc<PermissionRegistry>,
    resolver: Arc<AuthorityResolver>,
    store: Arc<AclStore>,
    graph: Arc<dyn NodeGraph>,
    cache: Arc<VerdictCache>,
    config: EvaluatorConfig,
}

impl PermissionEvaluator {
    pub fn new(
        registry: Arc<PermissionRegistry>,
        resolver: Arc<AuthorityResolver>,
        store: Arc<AclStore>,
        graph: Arc<dyn NodeGraph>,
        cache: Arc<VerdictCache>,
        config: EvaluatorConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            store,
            graph,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// The full check, including short-circuits and the verdict cache.
    pub fn evaluate(
        &self,
        ctx: &CallerContext,
        node: Option<NodeId>,
        permission: Option<&Permission>,
    ) -> Result<AccessStatus> {
        // A check against nothing cannot protect anything; a check for
        // nothing cannot be satisfied.
        let node = match node {
            Some(node) => node,
            None => return Ok(AccessStatus::Allowed),
        };
        let permission = match permission {
            Some(permission) => permission,
            None => return Ok(AccessStatus::Denied),
        };
        if !self.graph.exists(node) {
            return Ok(AccessStatus::Allowed);
        }
        if self.resolver.is_system(ctx) {
            return Ok(AccessStatus::Allowed);
        }

        let required = self.registry.canonical(permission);
        // A permission the model does not define is a configuration
        // error on every path, including the ones that answer open.
        if !self.registry.is_defined(&required) {
            return Err(RegistryError::UnknownPermission(required.to_string()).into());
        }
        if self.resolver.is_admin(ctx) {
            let verdict = if self.config.admin_denied.contains(&required) {
                AccessStatus::Denied
            } else {
                AccessStatus::Allowed
            };
            debug!("Admin short-circuit on {} for {}: {}", node, required, verdict);
            return Ok(verdict);
        }

        let authorities = self.resolver.resolve(ctx)?;
        let key = VerdictKey {
            node,
            permission: required.clone(),
            fingerprint: authorities.fingerprint(),
            generation: authorities.generation(),
        };
        if let Some(verdict) = self.cache.get(&key) {
            return Ok(verdict);
        }

        let chain = self.store.chain_entries(node, self.graph.as_ref())?;
        let verdict = if chain.is_empty() && !ctx.is_authenticated() {
            // Nothing has ever been protected here and nobody is asking
            // as anyone in particular.
            AccessStatus::Allowed
        } else {
            self.scan_chain(&chain, &required, authorities.members())?
        };

        debug!("Verdict on {} for {}: {}", node, required, verdict);
        self.cache.put(key, verdict);
        Ok(verdict)
    }

    /// The two-pass scan over flattened chain entries, which arrive in
    /// (position ascending, insertion) order so closer entries mask
    /// farther ones.
    fn scan_chain(
        &self,
        chain: &[model::AccessControlEntry],
        required: &Permission,
        authorities: &HashSet<Authority>,
    ) -> Result<AccessStatus> {
        let candidates: HashSet<Permission> = self.registry.granting(required)?.into_iter().collect();

        if self.config.any_deny_denies {
            // Deny pass: an earlier allow covering the required
            // permission masks later denials for the same authority.
            let mut masked: HashSet<&Authority> = HashSet::new();
            for entry in chain {
                match entry.status {
                    AccessStatus::Allowed => {
                        if self.covers(&entry.permission, required)? {
                            masked.insert(&entry.authority);
                        }
                    }
                    AccessStatus::Denied => {
                        if masked.contains(&entry.authority) {
                            continue;
                        }
                        if authorities.contains(&entry.authority)
                            && candidates.contains(&entry.permission)
                        {
                            debug!("Denied by entry {}", entry);
                            return Ok(AccessStatus::Denied);
                        }
                    }
                }
            }
        }

        // Grant pass: symmetric, with denials masking later grants.
        let mut masked: HashSet<&Authority> = HashSet::new();
        for entry in chain {
            match entry.status {
                AccessStatus::Denied => {
                    if self.covers(&entry.permission, required)? {
                        masked.insert(&entry.authority);
                    }
                }
                AccessStatus::Allowed => {
                    if masked.contains(&entry.authority) {
                        continue;
                    }
                    if authorities.contains(&entry.authority)
                        && candidates.contains(&entry.permission)
                    {
                        debug!("Allowed by entry {}", entry);
                        return Ok(AccessStatus::Allowed);
                    }
                }
            }
        }
        Ok(AccessStatus::Denied)
    }

    /// Whether an entry's permission touches the required one in either
    /// direction: itself, anything granting it, or anything it grants.
    /// Stored permissions no longer in the model cover only themselves.
    fn covers(&self, entry_permission: &Permission, required: &Permission) -> Result<bool> {
        if entry_permission.is_all() || entry_permission == required {
            return Ok(true);
        }
        if !self.registry.is_defined(entry_permission) {
            return Ok(false);
        }
        if self.registry.granting(entry_permission)?.contains(required) {
            return Ok(true);
        }
        Ok(self.registry.grantees(entry_permission)?.contains(required))
    }
}
