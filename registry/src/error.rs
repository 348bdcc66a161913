//! Error types for the permission registry.

use thiserror::Error;

/// Errors raised while loading or querying the permission model.
///
/// Unknown names indicate a configuration or programming mistake and are
/// surfaced immediately; they are never coerced into a deny verdict.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The requested permission is not defined by the model.
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// The requested node type is not defined by the model.
    #[error("Unknown node type: {0}")]
    UnknownType(String),

    /// A permission definition references a name that does not exist.
    #[error("Permission '{0}' grants undefined permission '{1}'")]
    DanglingGrant(String, String),

    /// A grant closure loops back onto itself.
    #[error("Permission '{0}' participates in a grant cycle")]
    GrantCycle(String),

    /// The model document could not be read or parsed.
    #[error("Model parsing failed: {0}")]
    ModelParsing(String),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
