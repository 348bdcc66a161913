//! Error types for the permission engine.

use thiserror::Error;

/// Errors raised by evaluation and by the mutation gateway.
///
/// Evaluation never fails open: a collaborator error is returned to the
/// caller instead of being folded into an allow or deny verdict.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A permission mutation was attempted outside a transaction.
    #[error("No active transaction for a permission mutation")]
    NoTransaction,

    /// Optimistic writes kept colliding with concurrent mutations.
    #[error("Gave up after {0} attempts due to concurrent ACL modification")]
    RetriesExhausted(usize),

    /// A notification sink rejected a mutation event.
    #[error("Notification sink failed: {0}")]
    Notification(String),

    #[error(transparent)]
    Model(#[from] model::ModelError),

    #[error(transparent)]
    Registry(#[from] registry::error::RegistryError),

    #[error(transparent)]
    Authority(#[from] authority::AuthorityError),

    #[error(transparent)]
    Acl(#[from] acl::AclError),

    #[error(transparent)]
    Cache(#[from] verdict_cache::error::CacheError),
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
