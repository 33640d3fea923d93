//! The [`Scope`] capability and explicit parent-chain lookup.

use std::fmt;
use std::sync::Arc;

use crate::error::ScopeError;
use crate::value::ScopeValue;

/// An object that resolves named values and may be enclosed by a parent.
///
/// Implementations must keep [`value_by_name`](Self::value_by_name) local:
/// it never falls back to the parent. Callers that want inheritance walk
/// [`parent`](Self::parent) themselves or use [`lookup`].
pub trait Scope: fmt::Debug + Send + Sync {
    /// Return the enclosing scope, or `None` for a root scope.
    ///
    /// Parents are held weakly; a parent that has been dropped reads as
    /// `None`.
    fn parent(&self) -> Option<Arc<dyn Scope>>;

    /// Whether `name` is registered in this scope. Has no side effects.
    fn has_value_by_name(&self, name: &str) -> bool;

    /// Resolve `name` in this scope only.
    ///
    /// # Errors
    ///
    /// [`ScopeError::UnknownName`] if the name is not registered locally,
    /// [`ScopeError::AccessFailed`] if the value could not be produced.
    fn value_by_name(&self, name: &str) -> Result<ScopeValue, ScopeError>;

    /// Whether this scope has no parent.
    fn is_root(&self) -> bool {
        self.parent().is_none()
    }
}

/// Resolve `name` starting at `scope` and walking towards the root.
///
/// Returns the value from the nearest scope that registers the name. An
/// accessor failure in that scope is returned as-is; the walk does not
/// continue past it.
///
/// # Errors
///
/// Returns [`ScopeError::UnknownName`] if no scope in the chain registers
/// `name`.
pub fn lookup(scope: &dyn Scope, name: &str) -> Result<ScopeValue, ScopeError> {
    if scope.has_value_by_name(name) {
        return scope.value_by_name(name);
    }
    let mut current = scope.parent();
    while let Some(next) = current {
        if next.has_value_by_name(name) {
            return next.value_by_name(name);
        }
        current = next.parent();
    }
    Err(ScopeError::unknown(name))
}

/// Number of ancestors above `scope` (0 for a root).
pub fn depth(scope: &dyn Scope) -> usize {
    let mut count: usize = 0;
    let mut current = scope.parent();
    while let Some(next) = current {
        count = count.saturating_add(1);
        current = next.parent();
    }
    count
}
