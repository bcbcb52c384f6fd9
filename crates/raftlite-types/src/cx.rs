//! Cooperative cancellation token threaded through blocking calls.
//!
//! `Cx` stands in for the teacher workspace's `asupersync::cx::Cx`
//! capability token, but unlike that stub it is not a no-op: it carries a
//! shared cancellation flag that `interrupt` (the gateway's
//! cancel-in-flight-request operation) sets, and that every suspension
//! point named in the specification's concurrency model checks before
//! resuming work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use raftlite_error::{RaftliteError, Result};

/// A cancellation token passed by reference through VFS, store, and
/// gateway calls.
///
/// Cloning a `Cx` shares the same cancellation flag; `fork` is used when a
/// request spawns a logically-nested operation (e.g. a checkpoint
/// opportunistically triggered from inside `Apply`) that should not itself
/// be cancellable by the outer request's `interrupt`.
#[derive(Debug, Clone)]
pub struct Cx {
    cancelled: Arc<AtomicBool>,
}

impl Cx {
    /// Create a fresh, non-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check for cancellation, returning `Err` if it has been requested.
    ///
    /// Call this at each suspension point (before a Raft barrier, before a
    /// Frames propose-and-wait, at each row-stream flush boundary) so an
    /// `interrupt` request actually stops work instead of merely being
    /// observed after the fact.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RaftliteError::internal("operation interrupted"));
        }
        Ok(())
    }

    /// A token that is independent of this one's cancellation state, for
    /// nested operations that must run to completion regardless of the
    /// parent request's fate (e.g. an opportunistic checkpoint).
    #[must_use]
    pub fn detached() -> Self {
        Self::new()
    }
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let cx = Cx::new();
        assert!(!cx.is_cancelled());
        assert!(cx.checkpoint().is_ok());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let cx = Cx::new();
        let clone = cx.clone();
        clone.cancel();
        assert!(cx.is_cancelled());
        assert!(cx.checkpoint().is_err());
    }

    #[test]
    fn detached_token_ignores_sibling_cancellation() {
        let cx = Cx::new();
        let detached = Cx::detached();
        cx.cancel();
        assert!(cx.is_cancelled());
        assert!(!detached.is_cancelled());
    }
}
