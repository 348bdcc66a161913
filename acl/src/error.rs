//! Error types for the ACL store.

use model::NodeId;
use thiserror::Error;

/// Errors raised by the ACL store and chain traversal.
///
/// Traversal failures are fatal: evaluation must never guess, and must
/// never default to an allow when the chain cannot be resolved.
#[derive(Debug, Error)]
pub enum AclError {
    /// A node's assigned ACL id has no ACL behind it.
    #[error("Node {0} references a missing ACL")]
    MissingAcl(NodeId),

    /// The parent chain could not be walked (broken link or a cycle).
    #[error("Inconsistent ancestor chain at {0}: {1}")]
    InconsistentChain(NodeId, String),

    /// The node is not present in the node graph.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// An optimistic write observed a stale ACL version.
    #[error("Concurrent modification of ACL on {node}: expected version {expected}, found {found}")]
    ConcurrentModification {
        node: NodeId,
        expected: u64,
        found: u64,
    },
}

/// A specialized Result type for ACL operations.
pub type Result<T> = std::result::Result<T, AclError>;
