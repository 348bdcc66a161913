//! Caller identity and run-as stacking.
//!
//! A [`CallerContext`] is an immutable value describing who a call runs
//! as. Nested "run as user X" scopes push onto a new value and leave the
//! original untouched, so restoration on every exit path (including
//! unwinding) is structural rather than something a guard has to redo.

use model::Authority;
use serde::{Deserialize, Serialize};

/// The well-known system superuser name.
pub const SYSTEM_USER: &str = "System";

/// An immutable caller identity with a run-as stack.
///
/// The bottom of the stack is the real authenticated user; the top is
/// the effective user permission checks are made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    stack: Vec<Authority>,
}

impl CallerContext {
    /// A context with no resolved identity.
    pub fn unauthenticated() -> Self {
        Self { stack: Vec::new() }
    }

    /// A context for an authenticated user.
    pub fn authenticated(user: Authority) -> Self {
        Self { stack: vec![user] }
    }

    /// A context for the system superuser.
    pub fn system() -> Self {
        Self::authenticated(Authority::new(SYSTEM_USER))
    }

    /// Returns a new context running as `user`, leaving `self` unchanged.
    pub fn run_as(&self, user: Authority) -> Self {
        let mut stack = self.stack.clone();
        stack.push(user);
        Self { stack }
    }

    /// The user checks are evaluated for (top of the run-as stack).
    pub fn effective_user(&self) -> Option<&Authority> {
        self.stack.last()
    }

    /// The originally authenticated user (bottom of the stack).
    pub fn real_user(&self) -> Option<&Authority> {
        self.stack.first()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Depth of run-as nesting; 1 for a plain authenticated context.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
