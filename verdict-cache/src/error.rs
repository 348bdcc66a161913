//! Error types for the verdict cache.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Subtree invalidation walks parent chains through the node graph.
    #[error("Node graph error during invalidation: {0}")]
    Graph(#[from] acl::AclError),
}

/// A specialized Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
