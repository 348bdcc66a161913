//! The permission engine facade.
//!
//! [`PermissionService`] wires the permission model, authority
//! resolution, the ACL store and the verdict cache into one surface:
//! reads (`has_permission`, the set-permission queries) and mutations
//! (set, delete, clear, inherit toggle, move/delete reactions). The
//! surrounding system supplies the node tree ([`acl::NodeGraph`]), the
//! directory ([`authority::AuthorityService`]), the transaction boundary
//! ([`TransactionContext`]) and a mutation observer
//! ([`NotificationSink`]).
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use acl::MemoryNodeGraph;
//! use authority::{AuthorityResolver, CallerContext, StaticAuthorityService};
//! use engine::{EvaluatorConfig, ManualTransaction, NullSink, PermissionService};
//! use model::{Authority, Permission};
//! use registry::PermissionRegistry;
//!
//! let graph = Arc::new(MemoryNodeGraph::new());
//! let root = graph.add_root();
//! let txn = Arc::new(ManualTransaction::new());
//! let service = PermissionService::new(
//!     Arc::new(PermissionRegistry::default_model()),
//!     Arc::new(AuthorityResolver::new(Arc::new(StaticAuthorityService::new()))),
//!     graph,
//!     Arc::new(NullSink),
//!     txn.clone(),
//!     EvaluatorConfig::default(),
//! );
//!
//! txn.begin();
//! service
//!     .set_permission(root, &Authority::new("andy"), &Permission::named("Read"), true)
//!     .unwrap();
//! let verdict = service
//!     .has_permission(
//!         &CallerContext::authenticated(Authority::new("andy")),
//!         Some(root),
//!         Some(&Permission::named("Read")),
//!     )
//!     .unwrap();
//! assert!(verdict.is_allowed());
//! ```

pub mod error;
pub mod evaluator;
pub mod mutation;
pub mod traits;

pub use error::{EngineError, Result};
pub use evaluator::{EvaluatorConfig, PermissionEvaluator};
pub use mutation::MutationGateway;
pub use traits::{ManualTransaction, NotificationSink, NullSink, SinkResult, TransactionContext};

use acl::{AclStore, NodeGraph};
use authority::{AuthorityResolver, CallerContext};
use model::{AccessControlEntry, AccessStatus, AclEntry, Authority, NodeId, Permission};
use registry::error::RegistryError;
use registry::PermissionRegistry;
use std::sync::Arc;
use verdict_cache::{CacheStats, VerdictCache};

/// The assembled permission engine.
pub struct PermissionService {
    registry: Arc<PermissionRegistry>,
    resolver: Arc<AuthorityResolver>,
    store: Arc<AclStore>,
    graph: Arc<dyn NodeGraph>,
    cache: Arc<VerdictCache>,
    evaluator: PermissionEvaluator,
    gateway: MutationGateway,
}

impl PermissionService {
    pub fn new(
        registry: Arc<PermissionRegistry>,
        resolver: Arc<AuthorityResolver>,
        graph: Arc<dyn NodeGraph>,
        sink: Arc<dyn NotificationSink>,
        txn: Arc<dyn TransactionContext>,
        config: EvaluatorConfig,
    ) -> Self {
        let store = Arc::new(AclStore::new());
        let cache = Arc::new(VerdictCache::default());
        let batch_size = config.batch_size;
        let evaluator = PermissionEvaluator::new(
            registry.clone(),
            resolver.clone(),
            store.clone(),
            graph.clone(),
            cache.clone(),
            config,
        );
        let gateway = MutationGateway::new(
            store.clone(),
            graph.clone(),
            cache.clone(),
            sink,
            txn,
            batch_size,
        );
        Self {
            registry,
            resolver,
            store,
            graph,
            cache,
            evaluator,
            gateway,
        }
    }

    /// The access check. `None` node answers ALLOWED and `None`
    /// permission DENIED, so callers can pass optional references
    /// straight through.
    pub fn has_permission(
        &self,
        ctx: &CallerContext,
        node: Option<NodeId>,
        permission: Option<&Permission>,
    ) -> Result<AccessStatus> {
        self.evaluator.evaluate(ctx, node, permission)
    }

    /// The entries set directly on the node's own list, plus its
    /// inherit flag.
    pub fn get_set_permissions(&self, node: NodeId) -> Result<(Vec<AclEntry>, bool)> {
        let entries = self.store.entries_of(node)?;
        let inherits = self.store.inherits(node)?;
        Ok((entries, inherits))
    }

    /// Every entry visible from the node, flattened with its distance
    /// up the inheritance chain.
    pub fn get_all_set_permissions(&self, node: NodeId) -> Result<Vec<AccessControlEntry>> {
        Ok(self.store.chain_entries(node, self.graph.as_ref())?)
    }

    /// The permissions that may be set on nodes of the given type.
    pub fn get_settable_permissions(&self, node_type: &str) -> Result<Vec<Permission>> {
        Ok(self.registry.settable(node_type)?)
    }

    /// Set one entry. `allow` selects the polarity. The permission must
    /// be defined by the model.
    pub fn set_permission(
        &self,
        node: NodeId,
        authority: &Authority,
        permission: &Permission,
        allow: bool,
    ) -> Result<()> {
        Authority::parse(authority.name())?;
        if !self.registry.is_defined(permission) {
            return Err(RegistryError::UnknownPermission(permission.to_string()).into());
        }
        let status = if allow {
            AccessStatus::Allowed
        } else {
            AccessStatus::Denied
        };
        self.gateway.set_permission(node, authority, permission, status)
    }

    /// Delete entries on the node. `None` fields widen the match: by
    /// authority, by permission, or everything. Returns the number of
    /// entries removed; deleting what is absent is a no-op.
    pub fn delete_permission(
        &self,
        node: NodeId,
        authority: Option<&Authority>,
        permission: Option<&Permission>,
    ) -> Result<usize> {
        self.gateway.delete_permission(node, authority, permission)
    }

    /// Remove every entry one authority holds on the node.
    pub fn clear_permission(&self, node: NodeId, authority: &Authority) -> Result<usize> {
        self.gateway.delete_permission(node, Some(authority), None)
    }

    /// Toggle inheritance from the parent chain. `batched` spreads the
    /// subtree cache fixup over bounded batches; observable behavior is
    /// identical.
    pub fn set_inherit_parent_permissions(
        &self,
        node: NodeId,
        inherits: bool,
        batched: bool,
    ) -> Result<()> {
        self.gateway.set_inherit_parent_permissions(node, inherits, batched)
    }

    /// Must be called after the graph re-parents a node.
    pub fn on_node_moved(&self, node: NodeId) -> Result<()> {
        self.gateway.on_node_moved(node)
    }

    /// Must be called after the graph removes a node.
    pub fn on_node_deleted(&self, node: NodeId) -> Result<()> {
        self.gateway.on_node_deleted(node)
    }

    /// Signal that group membership changed in the directory. Cached
    /// verdicts computed under the old memberships stop matching.
    pub fn invalidate_group_memberships(&self) {
        self.resolver.invalidate_memberships();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acl::MemoryNodeGraph;
    use authority::StaticAuthorityService;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl NotificationSink for RecordingSink {
        fn on_grant(
            &self,
            node: NodeId,
            authority: &Authority,
            permission: &Permission,
            status: AccessStatus,
        ) -> SinkResult {
            self.events
                .lock()
                .unwrap()
                .push(format!("grant {} {} {} {}", node, authority, permission, status));
            Ok(())
        }

        fn on_revoke(
            &self,
            node: NodeId,
            authority: Option<&Authority>,
            permission: Option<&Permission>,
        ) -> SinkResult {
            let authority = authority.map(|a| a.to_string()).unwrap_or_else(|| "*".into());
            let permission = permission.map(|p| p.to_string()).unwrap_or_else(|| "*".into());
            self.events
                .lock()
                .unwrap()
                .push(format!("revoke {} {} {}", node, authority, permission));
            Ok(())
        }

        fn on_inherit_changed(&self, node: NodeId, inherits: bool) -> SinkResult {
            self.events
                .lock()
                .unwrap()
                .push(format!("inherit {} {}", node, inherits));
            Ok(())
        }
    }

    struct Fixture {
        service: PermissionService,
        graph: Arc<MemoryNodeGraph>,
        directory: Arc<StaticAuthorityService>,
        txn: Arc<ManualTransaction>,
        sink: Arc<RecordingSink>,
    }

    fn fixture() -> Fixture {
        fixture_with(EvaluatorConfig::default())
    }

    fn fixture_with(config: EvaluatorConfig) -> Fixture {
        let graph = Arc::new(MemoryNodeGraph::new());
        let directory = Arc::new(StaticAuthorityService::new());
        let txn = Arc::new(ManualTransaction::new());
        let sink = Arc::new(RecordingSink::default());
        let service = PermissionService::new(
            Arc::new(PermissionRegistry::default_model()),
            Arc::new(AuthorityResolver::new(directory.clone())),
            graph.clone(),
            sink.clone(),
            txn.clone(),
            config,
        );
        txn.begin();
        Fixture {
            service,
            graph,
            directory,
            txn,
            sink,
        }
    }

    fn read() -> Permission {
        Permission::named("Read")
    }

    fn andy() -> Authority {
        Authority::new("andy")
    }

    fn as_user(name: &str) -> CallerContext {
        CallerContext::authenticated(Authority::new(name))
    }

    fn check(fx: &Fixture, ctx: &CallerContext, node: NodeId, permission: &Permission) -> AccessStatus {
        fx.service
            .has_permission(ctx, Some(node), Some(permission))
            .unwrap()
    }

    #[test]
    fn test_direct_allow_grants_permission() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();

        assert!(check(&fx, &as_user("andy"), node, &read()).is_allowed());
        assert!(!check(&fx, &as_user("lemur"), node, &read()).is_allowed());
    }

    #[test]
    fn test_composite_grant_satisfies_member_permission() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service
            .set_permission(node, &andy(), &Permission::named("FullControl"), true)
            .unwrap();

        assert!(check(&fx, &as_user("andy"), node, &read()).is_allowed());
        assert!(check(&fx, &as_user("andy"), node, &Permission::named("ReadProperties")).is_allowed());
        assert!(check(&fx, &as_user("andy"), node, &Permission::named("Delete")).is_allowed());
        // The wildcard is only satisfied by a wildcard entry.
        assert!(!check(&fx, &as_user("andy"), node, &Permission::all()).is_allowed());
    }

    #[rstest]
    #[case::any_deny_denies(true)]
    #[case::allow_wins(false)]
    fn test_closer_entry_shadows_farther_same_authority(#[case] any_deny_denies: bool) {
        let fx = fixture_with(EvaluatorConfig {
            any_deny_denies,
            ..EvaluatorConfig::default()
        });
        let root = fx.graph.add_root();
        let child = fx.graph.add_child(root).unwrap();

        // Parent denies, child allows: the closer allow wins under both
        // policies because it masks the denial for the same authority.
        fx.service.set_permission(root, &andy(), &read(), false).unwrap();
        fx.service.set_permission(child, &andy(), &read(), true).unwrap();
        assert!(check(&fx, &as_user("andy"), child, &read()).is_allowed());

        // And the parent's own verdict stays denied.
        assert!(!check(&fx, &as_user("andy"), root, &read()).is_allowed());
    }

    #[rstest]
    #[case::any_deny_denies(true, AccessStatus::Denied)]
    #[case::allow_wins(false, AccessStatus::Allowed)]
    fn test_group_deny_across_authorities(#[case] any_deny_denies: bool, #[case] expected: AccessStatus) {
        let fx = fixture_with(EvaluatorConfig {
            any_deny_denies,
            ..EvaluatorConfig::default()
        });
        let root = fx.graph.add_root();
        let child = fx.graph.add_child(root).unwrap();
        fx.directory.add_member(Authority::group("ONE"), andy());

        // A user-level allow on the child never masks a group-level deny
        // on the parent; only the policy decides which one wins.
        fx.service
            .set_permission(root, &Authority::group("ONE"), &read(), false)
            .unwrap();
        fx.service.set_permission(child, &andy(), &read(), true).unwrap();

        assert_eq!(check(&fx, &as_user("andy"), child, &read()), expected);
    }

    #[test]
    fn test_inheritance_cutoff_and_restore() {
        let fx = fixture();
        let root = fx.graph.add_root();
        let mid = fx.graph.add_child(root).unwrap();
        let leaf = fx.graph.add_child(mid).unwrap();
        fx.service.set_permission(root, &andy(), &read(), true).unwrap();

        assert!(check(&fx, &as_user("andy"), leaf, &read()).is_allowed());

        fx.service.set_inherit_parent_permissions(mid, false, false).unwrap();
        assert!(!check(&fx, &as_user("andy"), leaf, &read()).is_allowed());
        assert!(!check(&fx, &as_user("andy"), mid, &read()).is_allowed());

        fx.service.set_inherit_parent_permissions(mid, true, false).unwrap();
        assert!(check(&fx, &as_user("andy"), leaf, &read()).is_allowed());
    }

    #[test]
    fn test_batched_inherit_toggle_behaves_identically() {
        let fx = fixture();
        let root = fx.graph.add_root();
        let leaf = fx.graph.add_child(root).unwrap();
        fx.service.set_permission(root, &andy(), &read(), true).unwrap();
        assert!(check(&fx, &as_user("andy"), leaf, &read()).is_allowed());

        fx.service.set_inherit_parent_permissions(leaf, false, true).unwrap();
        assert!(!check(&fx, &as_user("andy"), leaf, &read()).is_allowed());
        assert_eq!(fx.sink.events().last().unwrap(), &format!("inherit {} false", leaf));
    }

    #[test]
    fn test_move_changes_chain_without_stale_verdicts() {
        let fx = fixture();
        let root = fx.graph.add_root();
        let open = fx.graph.add_child(root).unwrap();
        let closed = fx.graph.add_child(root).unwrap();
        let node = fx.graph.add_child(open).unwrap();
        fx.service.set_permission(open, &andy(), &read(), true).unwrap();

        // Prime the cache under the old parent.
        assert!(check(&fx, &as_user("andy"), node, &read()).is_allowed());

        fx.graph.move_node(node, closed).unwrap();
        fx.service.on_node_moved(node).unwrap();

        assert!(!check(&fx, &as_user("andy"), node, &read()).is_allowed());
    }

    #[test]
    fn test_user_case_variants_collapse() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service
            .set_permission(node, &Authority::new("Andy"), &read(), true)
            .unwrap();
        fx.service
            .set_permission(node, &Authority::new("ANDY"), &read(), true)
            .unwrap();

        assert!(check(&fx, &as_user("andy"), node, &read()).is_allowed());
        let (entries, _) = fx.service.get_set_permissions(node).unwrap();
        assert_eq!(entries.len(), 1, "case variants must collapse to one entry");
        assert_eq!(entries[0].authority.name(), "Andy", "first spelling is canonical");
    }

    #[test]
    fn test_set_and_delete_are_idempotent() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();

        let (entries, _) = fx.service.get_set_permissions(node).unwrap();
        assert_eq!(entries.len(), 1);

        assert_eq!(fx.service.delete_permission(node, Some(&andy()), Some(&read())).unwrap(), 1);
        assert_eq!(fx.service.delete_permission(node, Some(&andy()), Some(&read())).unwrap(), 0);
        assert!(!check(&fx, &as_user("andy"), node, &read()).is_allowed());
    }

    #[test]
    fn test_system_outranks_admin() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.directory.add_admin(Authority::new("boss"));
        let cancel = Permission::named("CancelCheckOut");

        // Admin passes every check except the admin-denied set.
        assert!(check(&fx, &as_user("boss"), node, &read()).is_allowed());
        assert!(!check(&fx, &as_user("boss"), node, &cancel).is_allowed());

        // System is exempt from the admin-denied set.
        assert!(check(&fx, &CallerContext::system(), node, &cancel).is_allowed());
        assert!(check(&fx, &CallerContext::system(), node, &read()).is_allowed());
    }

    #[test]
    fn test_empty_chain_is_open_only_when_unauthenticated() {
        let fx = fixture();
        let node = fx.graph.add_root();

        assert!(check(&fx, &CallerContext::unauthenticated(), node, &read()).is_allowed());
        assert!(!check(&fx, &as_user("andy"), node, &read()).is_allowed());
    }

    #[test]
    fn test_short_circuits() {
        let fx = fixture();
        let ctx = as_user("andy");

        let no_node = fx.service.has_permission(&ctx, None, Some(&read())).unwrap();
        assert!(no_node.is_allowed());

        let node = fx.graph.add_root();
        let no_permission = fx.service.has_permission(&ctx, Some(node), None).unwrap();
        assert!(!no_permission.is_allowed());

        let gone = fx
            .service
            .has_permission(&ctx, Some(NodeId(999)), Some(&read()))
            .unwrap();
        assert!(gone.is_allowed());
    }

    #[test]
    fn test_wildcard_entry_grants_everything() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service
            .set_permission(node, &Authority::everyone(), &Permission::all(), true)
            .unwrap();

        assert!(check(&fx, &as_user("anyone"), node, &read()).is_allowed());
        assert!(check(&fx, &as_user("anyone"), node, &Permission::named("Delete")).is_allowed());
        assert!(check(&fx, &as_user("anyone"), node, &Permission::all()).is_allowed());
    }

    #[test]
    fn test_unknown_permission_is_a_configuration_error() {
        let fx = fixture();
        let node = fx.graph.add_root();
        let bogus = Permission::named("Levitate");

        assert!(matches!(
            fx.service.set_permission(node, &andy(), &bogus, true),
            Err(EngineError::Registry(RegistryError::UnknownPermission(_)))
        ));
        assert!(matches!(
            fx.service.has_permission(&as_user("andy"), Some(node), Some(&bogus)),
            Err(EngineError::Registry(RegistryError::UnknownPermission(_)))
        ));
        // The open-by-default answer for an empty chain must not swallow
        // the configuration error either.
        assert!(matches!(
            fx.service
                .has_permission(&CallerContext::unauthenticated(), Some(node), Some(&bogus)),
            Err(EngineError::Registry(RegistryError::UnknownPermission(_)))
        ));
    }

    #[test]
    fn test_invalid_authority_name_rejected() {
        let fx = fixture();
        let node = fx.graph.add_root();
        assert!(matches!(
            fx.service.set_permission(node, &Authority::new(""), &read(), true),
            Err(EngineError::Model(_))
        ));
        assert!(matches!(
            fx.service.set_permission(node, &Authority::new("GROUP_"), &read(), true),
            Err(EngineError::Model(_))
        ));
    }

    #[test]
    fn test_three_hop_inheritance_for_group_member() {
        let fx = fixture();
        let root = fx.graph.add_root();
        let a = fx.graph.add_child(root).unwrap();
        let b = fx.graph.add_child(a).unwrap();
        let leaf = fx.graph.add_child(b).unwrap();
        fx.directory.add_member(Authority::group("READERS"), andy());
        fx.service
            .set_permission(root, &Authority::group("READERS"), &read(), true)
            .unwrap();

        assert!(check(&fx, &as_user("andy"), leaf, &read()).is_allowed());
        assert!(!check(&fx, &as_user("lemur"), leaf, &read()).is_allowed());

        let visible = fx.service.get_all_set_permissions(leaf).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].position, 3);
        assert!(visible[0].inherited());
    }

    #[test]
    fn test_mid_chain_group_deny_blocks_descendants() {
        let fx = fixture();
        let one = fx.graph.add_root();
        let three = fx.graph.add_child(one).unwrap();
        let four = fx.graph.add_child(three).unwrap();
        fx.directory.add_member(Authority::group("THREE"), andy());

        // Allowed at the top, denied to the group mid-chain: the denial
        // shadows the inherited grant for the node and everything below.
        fx.service.set_permission(one, &andy(), &read(), true).unwrap();
        fx.service
            .set_permission(three, &Authority::group("THREE"), &read(), false)
            .unwrap();

        assert!(check(&fx, &as_user("andy"), one, &read()).is_allowed());
        assert_eq!(check(&fx, &as_user("andy"), three, &read()), AccessStatus::Denied);
        assert_eq!(check(&fx, &as_user("andy"), four, &read()), AccessStatus::Denied);
    }

    #[test]
    fn test_clear_by_authority_leaves_others_untouched() {
        let fx = fixture();
        let node = fx.graph.add_root();
        let lemur = Authority::new("lemur");
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();
        fx.service
            .set_permission(node, &andy(), &Permission::named("Write"), true)
            .unwrap();
        fx.service.set_permission(node, &lemur, &read(), true).unwrap();

        assert_eq!(fx.service.clear_permission(node, &andy()).unwrap(), 2);
        assert!(!check(&fx, &as_user("andy"), node, &read()).is_allowed());
        assert!(check(&fx, &as_user("lemur"), node, &read()).is_allowed());
    }

    #[test]
    fn test_mutations_require_active_transaction() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.txn.end();

        assert!(matches!(
            fx.service.set_permission(node, &andy(), &read(), true),
            Err(EngineError::NoTransaction)
        ));
        assert!(matches!(
            fx.service.delete_permission(node, None, None),
            Err(EngineError::NoTransaction)
        ));
        assert!(matches!(
            fx.service.set_inherit_parent_permissions(node, false, false),
            Err(EngineError::NoTransaction)
        ));
    }

    #[test]
    fn test_notifications_arrive_in_mutation_order() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();
        fx.service.delete_permission(node, Some(&andy()), None).unwrap();
        fx.service.set_inherit_parent_permissions(node, false, false).unwrap();

        let events = fx.sink.events();
        assert_eq!(events.len(), 3);
        assert!(events[0].starts_with(&format!("grant {} andy", node)));
        assert_eq!(events[1], format!("revoke {} andy *", node));
        assert_eq!(events[2], format!("inherit {} false", node));
    }

    #[test]
    fn test_sink_failure_surfaces_as_notification_error() {
        struct FailingSink;

        impl NotificationSink for FailingSink {
            fn on_grant(&self, _: NodeId, _: &Authority, _: &Permission, _: AccessStatus) -> SinkResult {
                Err("downstream index offline".to_string())
            }

            fn on_revoke(&self, _: NodeId, _: Option<&Authority>, _: Option<&Permission>) -> SinkResult {
                Ok(())
            }

            fn on_inherit_changed(&self, _: NodeId, _: bool) -> SinkResult {
                Ok(())
            }
        }

        let graph = Arc::new(MemoryNodeGraph::new());
        let txn = Arc::new(ManualTransaction::new());
        let service = PermissionService::new(
            Arc::new(PermissionRegistry::default_model()),
            Arc::new(AuthorityResolver::new(Arc::new(StaticAuthorityService::new()))),
            graph.clone(),
            Arc::new(FailingSink),
            txn.clone(),
            EvaluatorConfig::default(),
        );
        txn.begin();
        let node = graph.add_root();

        assert!(matches!(
            service.set_permission(node, &andy(), &read(), true),
            Err(EngineError::Notification(_))
        ));
    }

    #[test]
    fn test_repeat_checks_hit_the_cache() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();

        let ctx = as_user("andy");
        check(&fx, &ctx, node, &read());
        check(&fx, &ctx, node, &read());

        let stats = fx.service.cache_stats();
        assert!(stats.hits >= 1, "second identical check should be served from cache");
    }

    #[test]
    fn test_membership_change_invalidates_cached_verdicts() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service
            .set_permission(node, &Authority::group("READERS"), &read(), true)
            .unwrap();

        // Cached as denied before andy joins the group.
        assert!(!check(&fx, &as_user("andy"), node, &read()).is_allowed());

        fx.directory.add_member(Authority::group("READERS"), andy());
        fx.service.invalidate_group_memberships();
        assert!(check(&fx, &as_user("andy"), node, &read()).is_allowed());
    }

    #[test]
    fn test_node_deletion_drops_state() {
        let fx = fixture();
        let root = fx.graph.add_root();
        let node = fx.graph.add_child(root).unwrap();
        fx.service.set_permission(node, &andy(), &read(), true).unwrap();
        check(&fx, &as_user("andy"), node, &read());

        fx.graph.remove_node(node).unwrap();
        fx.service.on_node_deleted(node).unwrap();

        // A nonexistent node answers open.
        assert!(check(&fx, &as_user("andy"), node, &read()).is_allowed());
        let (entries, _) = fx.service.get_set_permissions(node).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_run_as_switches_effective_identity() {
        let fx = fixture();
        let node = fx.graph.add_root();
        fx.service.set_permission(node, &Authority::new("lemur"), &read(), true).unwrap();

        let andy = as_user("andy");
        assert!(!check(&fx, &andy, node, &read()).is_allowed());
        let as_lemur = andy.run_as(Authority::new("lemur"));
        assert!(check(&fx, &as_lemur, node, &read()).is_allowed());
        // The outer context is untouched.
        assert!(!check(&fx, &andy, node, &read()).is_allowed());
    }

    #[test]
    fn test_settable_permissions_for_type() {
        let fx = fixture();
        let settable = fx.service.get_settable_permissions("base").unwrap();
        assert!(settable.contains(&read()));
        assert!(settable.contains(&Permission::named("FullControl")));
        assert!(fx.service.get_settable_permissions("wormhole").is_err());
    }
}
