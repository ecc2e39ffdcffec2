//! Liveness guarding for asynchronous callbacks
//!
//! Every streamed event must pass a three-part check before it may touch
//! conversation state: the consumer is still mounted, the request's token has
//! not been cancelled, and the request has not been superseded. The check
//! runs twice: once on entry for an early exit, and again inside the
//! critical section immediately before the mutation commits, because a
//! teardown or supersession can land between the two.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::handle::RequestHandle;
use super::session::{ConversationSession, SharedSession};

/// Mount flag for the consuming context, read at call time.
///
/// The owning host flips this exactly once at teardown; guards never capture
/// its value, only the token, so there is no stale copy to go wrong.
#[derive(Clone)]
pub struct LivenessToken {
    alive: Arc<AtomicBool>,
}

impl LivenessToken {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// One-way: a revoked token never becomes alive again
    pub fn revoke(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl Default for LivenessToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate between one request's event stream and the shared session
pub struct LivenessGuard {
    liveness: LivenessToken,
    handle: RequestHandle,
    session: SharedSession,
}

impl LivenessGuard {
    pub fn new(liveness: LivenessToken, handle: RequestHandle, session: SharedSession) -> Self {
        Self {
            liveness,
            handle,
            session,
        }
    }

    fn predicate(&self, session: &ConversationSession) -> bool {
        self.liveness.is_alive() && !self.handle.is_cancelled() && session.is_current(&self.handle)
    }

    /// Entry check; takes the session lock only briefly for the currency test
    pub fn is_live(&self) -> bool {
        if !self.liveness.is_alive() || self.handle.is_dead() {
            return false;
        }
        let session = self.session.lock();
        session.is_current(&self.handle)
    }

    /// Predicate and mutation as a single step.
    ///
    /// Returns `None` without any observable effect when the request is no
    /// longer live; otherwise re-verifies the predicate under the lock and
    /// applies `mutate` in full. Partial application is impossible: the
    /// mutation runs entirely inside one critical section.
    pub fn commit<R>(&self, mutate: impl FnOnce(&mut ConversationSession) -> R) -> Option<R> {
        if !self.is_live() {
            return None;
        }
        let mut session = self.session.lock();
        if !self.predicate(&session) {
            return None;
        }
        Some(mutate(&mut session))
    }
}
