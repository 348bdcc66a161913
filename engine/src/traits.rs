//! Collaborator traits supplied by the surrounding system.

use model::{AccessStatus, Authority, NodeId, Permission};
use std::sync::atomic::{AtomicBool, Ordering};

/// What a sink returns. Errors are wrapped into
/// [`crate::EngineError::Notification`] by the gateway.
pub type SinkResult = std::result::Result<(), String>;

/// Observer of permission mutations.
///
/// Called synchronously after each store write and before the mutation
/// returns, so downstream indexes see events in mutation order. A sink
/// error aborts the mutation's result (the store write itself is already
/// committed; the caller's transaction decides what to do with that).
pub trait NotificationSink: Send + Sync {
    /// An entry was set. `status` is the polarity that was written.
    fn on_grant(
        &self,
        node: NodeId,
        authority: &Authority,
        permission: &Permission,
        status: AccessStatus,
    ) -> SinkResult;

    /// Entries were removed. `None` fields describe the bulk modes: by
    /// authority, by permission, or everything on the node.
    fn on_revoke(
        &self,
        node: NodeId,
        authority: Option<&Authority>,
        permission: Option<&Permission>,
    ) -> SinkResult;

    fn on_inherit_changed(&self, node: NodeId, inherits: bool) -> SinkResult;
}

/// A sink that ignores every event.
#[derive(Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn on_grant(&self, _: NodeId, _: &Authority, _: &Permission, _: AccessStatus) -> SinkResult {
        Ok(())
    }

    fn on_revoke(&self, _: NodeId, _: Option<&Authority>, _: Option<&Permission>) -> SinkResult {
        Ok(())
    }

    fn on_inherit_changed(&self, _: NodeId, _: bool) -> SinkResult {
        Ok(())
    }
}

/// The ambient transaction, owned by the caller.
///
/// The gateway never begins, commits or rolls back; it only refuses to
/// mutate outside an active transaction.
pub trait TransactionContext: Send + Sync {
    fn is_active(&self) -> bool;
}

/// A hand-driven transaction flag for wiring and tests.
#[derive(Default)]
pub struct ManualTransaction {
    active: AtomicBool,
}

impl ManualTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl TransactionContext for ManualTransaction {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_transaction_toggles() {
        let txn = ManualTransaction::new();
        assert!(!txn.is_active());
        txn.begin();
        assert!(txn.is_active());
        txn.end();
        assert!(!txn.is_active());
    }
}
