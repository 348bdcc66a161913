//! Error types for the model crate.

use thiserror::Error;

/// Errors raised while constructing model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An authority name was empty or otherwise unusable.
    #[error("Invalid authority name: {0}")]
    InvalidAuthority(String),

    /// A permission name or namespace was empty.
    #[error("Invalid permission name: {0}")]
    InvalidPermission(String),
}

/// A specialized Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
