//! Streaming session controller
//!
//! Composition root for one conversation: wires the transport, the liveness
//! guard, and the shared session. `send` appends the user message and an
//! assistant placeholder synchronously, supersedes any in-flight request, and
//! spawns a pump task that routes every streamed event through a guarded
//! commit. `cancel` and `teardown` only ever invalidate handles; state is
//! touched exclusively by guarded event application.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::monitor::{Monitor, MonitorEvent};
use crate::store::TranscriptStore;
use crate::transport::{StreamEvent, Transport};

use super::error::TransportError;
use super::handle::RequestHandle;
use super::liveness::{LivenessGuard, LivenessToken};
use super::message::Message;
use super::session::{ConversationSession, SharedSession};

pub struct SessionController<T: Transport> {
    transport: Arc<T>,
    session: SharedSession,
    liveness: LivenessToken,
    monitor: Arc<dyn Monitor>,
    store: Arc<dyn TranscriptStore>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> SessionController<T> {
    /// `liveness` is owned by the hosting context, which revokes it on
    /// unmount; the controller reads it at call time, never by captured value
    pub fn new(
        transport: T,
        liveness: LivenessToken,
        monitor: Arc<dyn Monitor>,
        store: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            session: ConversationSession::shared(),
            liveness,
            monitor,
            store,
            pump: Mutex::new(None),
        }
    }

    /// Dispatch one user message. Non-blocking and non-throwing: invalid
    /// input and transport failures never surface as panics or errors here.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            warn!("ignoring send of empty message");
            return;
        }
        if !self.liveness.is_alive() {
            warn!("ignoring send after teardown");
            return;
        }

        // Synchronous phase, one critical section: snapshot history, append
        // user + placeholder, and supersede any in-flight request before the
        // new one is dispatched.
        let (handle, assistant_id, history) = {
            let mut session = self.session.lock();
            let history = session.messages().to_vec();
            session.push_message(Message::user(text));
            let assistant_id = session.push_message(Message::assistant_placeholder());
            let handle = session.begin_request();
            (handle, assistant_id, history)
        };

        self.monitor.record(MonitorEvent::RequestStarted {
            request_id: handle.id(),
        });

        let guard = LivenessGuard::new(
            self.liveness.clone(),
            handle.clone(),
            Arc::clone(&self.session),
        );
        let pump = Pump {
            transport: Arc::clone(&self.transport),
            guard,
            handle,
            assistant_id,
            monitor: Arc::clone(&self.monitor),
            store: Arc::clone(&self.store),
            liveness: self.liveness.clone(),
        };
        let message = text.to_string();
        let task = tokio::spawn(async move { pump.run(message, history).await });

        // A replaced pump exits on its own via its cancelled token
        *self.pump.lock() = Some(task);
    }

    /// Stop the in-flight request, if any. Idempotent; the partial assistant
    /// message stays in the log in whatever state it reached.
    pub fn cancel(&self) {
        self.session.lock().cancel_request();
    }

    /// Mark the consumer gone and cancel. Safe to call repeatedly; assumes
    /// nothing about code running afterwards.
    pub fn teardown(&self) {
        self.liveness.revoke();
        self.cancel();
    }

    /// Wait for the most recent pump task to finish; used for orderly
    /// shutdown and by tests to reach quiescence
    pub async fn await_idle(&self) {
        let task = self.pump.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.session.lock().messages().to_vec()
    }

    pub fn progress(&self) -> Option<String> {
        self.session.lock().progress().map(str::to_string)
    }

    pub fn is_streaming(&self) -> bool {
        self.session.lock().has_active_request()
    }
}

/// One request's event loop: everything it does to the session goes through
/// the liveness guard
struct Pump<T: Transport> {
    transport: Arc<T>,
    guard: LivenessGuard,
    handle: RequestHandle,
    assistant_id: Uuid,
    monitor: Arc<dyn Monitor>,
    store: Arc<dyn TranscriptStore>,
    liveness: LivenessToken,
}

impl<T: Transport> Pump<T> {
    async fn run(self, message: String, history: Vec<Message>) {
        let token = self.handle.cancellation_token();

        let mut events = match self.transport.open(&message, &history, token.clone()).await {
            Ok(rx) => rx,
            Err(error) => {
                // Same guarded path as a streamed error event
                self.finish_with_error(&error);
                return;
            }
        };

        loop {
            let event = tokio::select! {
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.monitor.record(MonitorEvent::EventReceived {
                request_id: self.handle.id(),
            });

            match event {
                StreamEvent::Chunk { delta } => {
                    self.guard
                        .commit(|session| session.apply_chunk(self.assistant_id, &delta));
                }
                StreamEvent::Step { step } => {
                    self.guard
                        .commit(|session| session.apply_step(self.assistant_id, step));
                }
                StreamEvent::Complete {
                    text,
                    sources,
                    metadata,
                } => {
                    let snapshot = self.guard.commit(|session| {
                        let applied =
                            session.apply_complete(self.assistant_id, text, sources, metadata);
                        session.retire(&self.handle);
                        applied.then(|| session.messages().to_vec())
                    });
                    self.monitor.record(MonitorEvent::TerminalReached {
                        request_id: self.handle.id(),
                    });
                    if let Some(Some(messages)) = snapshot {
                        self.persist(messages).await;
                    }
                    // One terminal per stream; anything further is discarded
                    break;
                }
                StreamEvent::Error { error } => {
                    if error.is_cancellation() {
                        // Not an error: a cancelled request just stops
                        break;
                    }
                    self.finish_with_error(&error);
                    break;
                }
            }
        }

        // A stream can end without a terminal commit (wire-level cancellation,
        // channel closed early). The handle must not stay active with no pump
        // behind it; after a normal terminal this is a guarded no-op.
        self.guard.commit(|session| session.retire(&self.handle));
    }

    fn finish_with_error(&self, error: &TransportError) {
        self.guard.commit(|session| {
            session.apply_error(self.assistant_id, error);
            session.retire(&self.handle);
        });
        self.monitor.record(MonitorEvent::Failed {
            request_id: self.handle.id(),
            code: error.code(),
        });
    }

    /// Fire-and-forget persistence: deferred past completion, so it re-checks
    /// consumer liveness before doing anything; failures are logged only
    async fn persist(&self, messages: Vec<Message>) {
        if !self.liveness.is_alive() {
            return;
        }
        if let Err(err) = self.store.persist(messages).await {
            warn!("transcript persistence failed: {err:#}");
        }
    }
}
