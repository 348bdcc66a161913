//! Caller identity and authority resolution.
//!
//! Given a caller context (who the call runs as, including nested run-as
//! scopes), this crate produces the full authorisation set used to match
//! access-control entries: the user itself, the transitive closure of
//! its group memberships, the authenticated-principal role, and the
//! all-authorities wildcard. Membership lookups go through the
//! [`AuthorityService`] collaborator trait; a registered in-memory
//! implementation is provided for wiring and tests.

pub mod context;
pub mod error;
pub mod resolver;

pub use context::{CallerContext, SYSTEM_USER};
pub use error::{AuthorityError, Result};
pub use resolver::{AuthorityResolver, AuthorityService, AuthoritySet, StaticAuthorityService};
