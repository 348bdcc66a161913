//! Error types for authority resolution.

use thiserror::Error;

/// Errors raised while resolving a caller's authorities.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Group containment loops back onto itself.
    #[error("Group membership cycle involving: {0}")]
    MembershipCycle(String),
}

/// A specialized Result type for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;
