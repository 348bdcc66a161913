//! Resolution of a caller to its full authorisation set.

use crate::context::{CallerContext, SYSTEM_USER};
use crate::error::{AuthorityError, Result};
use model::Authority;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Membership and privilege lookups, supplied by the surrounding system.
pub trait AuthorityService: Send + Sync {
    /// The transitive closure of groups the user belongs to.
    fn contained_groups(&self, user: &Authority) -> Result<HashSet<Authority>>;

    /// True for administrator-equivalent principals.
    fn is_admin(&self, user: &Authority) -> bool;

    /// True for the system superuser. System outranks admin: it is never
    /// subject to the admin-denied permission set.
    fn is_system(&self, user: &Authority) -> bool;
}

/// The resolved authorisation set for one caller, plus the keying data
/// the verdict cache needs.
#[derive(Debug, Clone)]
pub struct AuthoritySet {
    members: HashSet<Authority>,
    fingerprint: u64,
    generation: u64,
}

impl AuthoritySet {
    pub fn contains(&self, authority: &Authority) -> bool {
        self.members.contains(authority)
    }

    pub fn members(&self) -> &HashSet<Authority> {
        &self.members
    }

    /// Stable hash over the member identities. Two callers with the same
    /// authorities share cached verdicts.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// The resolver generation this set was built under. Bumped when
    /// group membership changes, invalidating older cached verdicts.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Resolves caller contexts into authority sets.
pub struct AuthorityResolver {
    service: Arc<dyn AuthorityService>,
    generation: AtomicU64,
}

impl AuthorityResolver {
    pub fn new(service: Arc<dyn AuthorityService>) -> Self {
        Self {
            service,
            generation: AtomicU64::new(0),
        }
    }

    pub fn service(&self) -> &Arc<dyn AuthorityService> {
        &self.service
    }

    /// Signal that group membership changed somewhere. Previously
    /// resolved sets keep working but no longer match cached verdicts.
    pub fn invalidate_memberships(&self) {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Authority membership generation bumped to {}", gen);
    }

    /// Whether the context's effective user is the system superuser.
    pub fn is_system(&self, ctx: &CallerContext) -> bool {
        match ctx.effective_user() {
            Some(user) => user.name() == SYSTEM_USER || self.service.is_system(user),
            None => false,
        }
    }

    /// Whether the context's effective user is administrator-equivalent.
    pub fn is_admin(&self, ctx: &CallerContext) -> bool {
        match ctx.effective_user() {
            Some(user) => self.service.is_admin(user),
            None => false,
        }
    }

    /// Resolve the full authorisation set for a caller: the effective
    /// user, its transitive groups, ROLE_AUTHENTICATED for resolved
    /// identities, and ALL_AUTHORITIES always.
    pub fn resolve(&self, ctx: &CallerContext) -> Result<AuthoritySet> {
        let mut members = HashSet::new();
        members.insert(Authority::everyone());

        if let Some(user) = ctx.effective_user() {
            members.insert(user.clone());
            members.insert(Authority::authenticated_role());
            members.extend(self.service.contained_groups(user)?);
        }

        let fingerprint = fingerprint_of(&members);
        Ok(AuthoritySet {
            members,
            fingerprint,
            generation: self.generation.load(Ordering::SeqCst),
        })
    }
}

fn fingerprint_of(members: &HashSet<Authority>) -> u64 {
    // Sort folded names so the hash is order-independent.
    let mut names: Vec<String> = members
        .iter()
        .map(|a| {
            if a.is_user() {
                a.name().to_lowercase()
            } else {
                a.name().to_string()
            }
        })
        .collect();
    names.sort();
    let mut hasher = DefaultHasher::new();
    names.hash(&mut hasher);
    hasher.finish()
}

/// An in-memory [`AuthorityService`] with explicitly registered group
/// membership and privilege flags.
#[derive(Default)]
pub struct StaticAuthorityService {
    direct_groups: RwLock<HashMap<Authority, HashSet<Authority>>>,
    admins: RwLock<HashSet<Authority>>,
}

impl StaticAuthorityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register direct membership of `member` in `group`.
    pub fn add_member(&self, group: Authority, member: Authority) {
        let mut groups = self.direct_groups.write().unwrap_or_else(|e| e.into_inner());
        groups.entry(member).or_default().insert(group);
    }

    pub fn add_admin(&self, user: Authority) {
        let mut admins = self.admins.write().unwrap_or_else(|e| e.into_inner());
        admins.insert(user);
    }
}

impl AuthorityService for StaticAuthorityService {
    fn contained_groups(&self, user: &Authority) -> Result<HashSet<Authority>> {
        let direct = self.direct_groups.read().unwrap_or_else(|e| e.into_inner());
        let mut out = HashSet::new();
        let mut stack: Vec<Authority> = direct.get(user).into_iter().flatten().cloned().collect();
        let mut steps = 0usize;
        while let Some(group) = stack.pop() {
            steps += 1;
            if steps > 10_000 {
                return Err(AuthorityError::MembershipCycle(user.name().to_string()));
            }
            if out.insert(group.clone()) {
                stack.extend(direct.get(&group).into_iter().flatten().cloned());
            }
        }
        Ok(out)
    }

    fn is_admin(&self, user: &Authority) -> bool {
        let admins = self.admins.read().unwrap_or_else(|e| e.into_inner());
        admins.contains(user)
    }

    fn is_system(&self, user: &Authority) -> bool {
        user.name() == SYSTEM_USER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(service: StaticAuthorityService) -> AuthorityResolver {
        AuthorityResolver::new(Arc::new(service))
    }

    #[test]
    fn test_resolved_set_contains_user_role_and_wildcard() {
        let resolver = resolver_with(StaticAuthorityService::new());
        let ctx = CallerContext::authenticated(Authority::new("andy"));
        let set = resolver.resolve(&ctx).unwrap();

        assert!(set.contains(&Authority::new("andy")));
        assert!(set.contains(&Authority::new("ANDY")), "user match must be caseless");
        assert!(set.contains(&Authority::authenticated_role()));
        assert!(set.contains(&Authority::everyone()));
    }

    #[test]
    fn test_unauthenticated_resolves_to_wildcard_only() {
        let resolver = resolver_with(StaticAuthorityService::new());
        let set = resolver.resolve(&CallerContext::unauthenticated()).unwrap();
        assert_eq!(set.members().len(), 1);
        assert!(set.contains(&Authority::everyone()));
        assert!(!set.contains(&Authority::authenticated_role()));
    }

    #[test]
    fn test_transitive_group_membership() {
        let service = StaticAuthorityService::new();
        service.add_member(Authority::group("ONE"), Authority::new("andy"));
        service.add_member(Authority::group("TWO"), Authority::group("ONE"));

        let resolver = resolver_with(service);
        let set = resolver
            .resolve(&CallerContext::authenticated(Authority::new("andy")))
            .unwrap();
        assert!(set.contains(&Authority::group("ONE")));
        assert!(set.contains(&Authority::group("TWO")), "containment must be transitive");
    }

    #[test]
    fn test_fingerprint_tracks_membership_not_order() {
        let service = StaticAuthorityService::new();
        service.add_member(Authority::group("ONE"), Authority::new("andy"));
        let resolver = resolver_with(service);

        let ctx = CallerContext::authenticated(Authority::new("andy"));
        let a = resolver.resolve(&ctx).unwrap();
        let b = resolver.resolve(&ctx).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let other = resolver
            .resolve(&CallerContext::authenticated(Authority::new("lemur")))
            .unwrap();
        assert_ne!(a.fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_generation_bumps_on_invalidation() {
        let resolver = resolver_with(StaticAuthorityService::new());
        let ctx = CallerContext::authenticated(Authority::new("andy"));
        let before = resolver.resolve(&ctx).unwrap();
        resolver.invalidate_memberships();
        let after = resolver.resolve(&ctx).unwrap();
        assert_eq!(before.generation() + 1, after.generation());
    }

    #[test]
    fn test_system_detection_follows_run_as() {
        let resolver = resolver_with(StaticAuthorityService::new());
        let andy = CallerContext::authenticated(Authority::new("andy"));
        assert!(!resolver.is_system(&andy));
        assert!(resolver.is_system(&CallerContext::system()));
        // Running as system grants system privilege; dropping back does not.
        let as_system = andy.run_as(Authority::new(SYSTEM_USER));
        assert!(resolver.is_system(&as_system));
        assert!(!resolver.is_system(&andy));
    }
}
