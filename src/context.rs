//! Thread-affine "current GPU context" tracking.
//!
//! Every operation that touches GPU state first makes its context current through a
//! [`ContextGuard`]. Guards nest: acquiring the context that is already current is free, and
//! dropping a guard that switched contexts restores the previous one.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a rendering context. Each backend instance owns exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a process-unique context id.
    pub fn next() -> Self {
        static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

thread_local! {
    static CURRENT_CONTEXT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// The context current on the calling thread, if any.
pub fn current_context() -> Option<ContextId> {
    CURRENT_CONTEXT.with(Cell::get)
}

/// Scoped acquisition of a context on the calling thread.
#[must_use = "the context is released as soon as the guard is dropped"]
pub struct ContextGuard {
    restore: Option<Option<ContextId>>,
}

impl ContextGuard {
    pub fn acquire(context: ContextId) -> Self {
        let previous = current_context();
        if previous == Some(context) {
            return Self { restore: None };
        }

        CURRENT_CONTEXT.with(|current| current.set(Some(context)));
        Self {
            restore: Some(previous),
        }
    }

    /// Whether this guard switched contexts (and will switch back on drop).
    pub fn switched(&self) -> bool {
        self.restore.is_some()
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.restore.take() {
            CURRENT_CONTEXT.with(|current| current.set(previous));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_context_on_drop() {
        let outer = ContextId::next();
        let inner = ContextId::next();

        let outer_guard = ContextGuard::acquire(outer);
        assert_eq!(current_context(), Some(outer));
        {
            let inner_guard = ContextGuard::acquire(inner);
            assert!(inner_guard.switched());
            assert_eq!(current_context(), Some(inner));
        }
        assert_eq!(current_context(), Some(outer));
        drop(outer_guard);
        assert_eq!(current_context(), None);
    }

    #[test]
    fn nested_acquire_of_current_context_is_a_no_op() {
        let context = ContextId::next();
        let outer_guard = ContextGuard::acquire(context);
        {
            let nested_guard = ContextGuard::acquire(context);
            assert!(!nested_guard.switched());
        }
        assert_eq!(current_context(), Some(context));
        drop(outer_guard);
    }

    #[test]
    fn context_ids_are_unique() {
        assert_ne!(ContextId::next(), ContextId::next());
    }
}
