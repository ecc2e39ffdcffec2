//! Request identity and supersession
//!
//! One logical send/response cycle is identified by a [`RequestHandle`].
//! Handles are compared by identity, never by re-deriving an id string, and
//! exactly one handle is current per session at any instant. A handle dies by
//! supersession (a newer request replaced it), cancellation, or teardown, and
//! is never resurrected.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity token for one logical send/response cycle
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: Uuid,
    token: CancellationToken,
    superseded: AtomicBool,
}

impl RequestHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: Uuid::new_v4(),
                token: CancellationToken::new(),
                superseded: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The token the transport watches for cooperative cancellation
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn is_superseded(&self) -> bool {
        self.inner.superseded.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Superseded or cancelled; dead handles never produce effects again
    pub fn is_dead(&self) -> bool {
        self.is_superseded() || self.is_cancelled()
    }

    /// Mark this handle dead and signal the transport to stop.
    ///
    /// Cancellation is cooperative: the transport is expected, but not
    /// required, to stop producing events promptly. Correctness does not
    /// depend on it doing so.
    pub(crate) fn supersede(&self) {
        self.inner.superseded.store(true, Ordering::SeqCst);
        self.inner.token.cancel();
    }

    /// Identity comparison: same logical request, not merely equal ids
    pub fn same_request(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.inner.id)
            .field("superseded", &self.is_superseded())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
