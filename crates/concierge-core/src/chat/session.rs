//! Shared conversation state and the event reducer
//!
//! The session owns the ordered message log and the current request handle.
//! Each streamed event has exactly one reducer with one semantic, applied in
//! arrival order; terminal messages reject all further mutation.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use super::error::TransportError;
use super::handle::RequestHandle;
use super::message::{AgentStep, Message, MessageStatus, Source, StepKind};

/// The session behind the lock shared by the controller and its pump tasks
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Ordered message log plus the at-most-one active request
#[derive(Default)]
pub struct ConversationSession {
    messages: Vec<Message>,
    active: Option<RequestHandle>,
    progress: Option<String>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSession {
        Arc::new(Mutex::new(Self::new()))
    }

    // --- request lifecycle -------------------------------------------------

    /// Start a new request, superseding any in-flight one first.
    ///
    /// Supersession is synchronous and happens before the new handle exists,
    /// so there is never a window with two current handles.
    pub fn begin_request(&mut self) -> RequestHandle {
        if let Some(prev) = self.active.take() {
            prev.supersede();
        }
        let handle = RequestHandle::new();
        self.active = Some(handle.clone());
        handle
    }

    /// Invalidate the active request, if any. Idempotent.
    pub fn cancel_request(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.supersede();
            self.progress = None;
        }
    }

    /// True iff `handle` is the active handle and has not been superseded
    pub fn is_current(&self, handle: &RequestHandle) -> bool {
        !handle.is_superseded()
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.same_request(handle))
    }

    /// Clear the active slot after a terminal event, without cancelling the
    /// token: the request finished, it was not aborted
    pub(crate) fn retire(&mut self, handle: &RequestHandle) {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.same_request(handle))
        {
            self.active = None;
        }
    }

    pub fn has_active_request(&self) -> bool {
        self.active.is_some()
    }

    // --- message log -------------------------------------------------------

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Display-only progress label derived from agent steps
    pub fn progress(&self) -> Option<&str> {
        self.progress.as_deref()
    }

    pub fn push_message(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    // --- reducer -----------------------------------------------------------

    /// Append one streamed text fragment. Transitions Pending -> Streaming;
    /// content only ever grows here, in arrival order.
    pub fn apply_chunk(&mut self, id: Uuid, delta: &str) {
        let Some(message) = self.message_mut(id) else {
            return;
        };
        if message.status.is_terminal() {
            return;
        }
        message.status = MessageStatus::Streaming;
        message.content.push_str(delta);
    }

    /// Append one agent step and refresh the advisory progress label
    pub fn apply_step(&mut self, id: Uuid, step: AgentStep) {
        let Some(message) = self.message_mut(id) else {
            return;
        };
        if message.status.is_terminal() {
            return;
        }
        let label = progress_label(&step);
        message.steps.push(step);
        self.progress = Some(label);
    }

    /// Terminal success: the final text replaces accumulated chunks (it is
    /// authoritative and may differ from their concatenation); sources and
    /// metadata attach atomically with it.
    ///
    /// Returns true when applied, which is the only point at which the
    /// finished message becomes eligible for persistence.
    pub fn apply_complete(
        &mut self,
        id: Uuid,
        text: String,
        sources: Vec<Source>,
        metadata: Option<Value>,
    ) -> bool {
        let Some(message) = self.message_mut(id) else {
            return false;
        };
        if message.status.is_terminal() {
            return false;
        }
        message.content = text;
        message.sources = sources;
        message.metadata = metadata;
        message.status = MessageStatus::Complete;
        self.progress = None;
        true
    }

    /// Terminal failure: write the classification-appropriate user-facing
    /// message, never the raw error string
    pub fn apply_error(&mut self, id: Uuid, error: &TransportError) {
        let Some(message) = self.message_mut(id) else {
            return;
        };
        if message.status.is_terminal() {
            return;
        }
        message.content = error.user_message();
        message.status = MessageStatus::Errored;
        self.progress = None;
    }
}

fn progress_label(step: &AgentStep) -> String {
    match &step.kind {
        StepKind::Status => step
            .payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("Working on it")
            .to_string(),
        StepKind::ToolStart => {
            let tool = step
                .payload
                .get("tool")
                .and_then(Value::as_str)
                .unwrap_or("a tool");
            format!("Using {tool}")
        }
        StepKind::ToolEnd => "Processing results".to_string(),
        StepKind::Other(kind) => kind.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_with_placeholder() -> (ConversationSession, Uuid) {
        let mut session = ConversationSession::new();
        session.push_message(Message::user("hi"));
        let id = session.push_message(Message::assistant_placeholder());
        (session, id)
    }

    #[test]
    fn test_begin_request_supersedes_previous() {
        let mut session = ConversationSession::new();
        let first = session.begin_request();
        assert!(session.is_current(&first));

        let second = session.begin_request();
        assert!(first.is_superseded());
        assert!(first.is_cancelled());
        assert!(!session.is_current(&first));
        assert!(session.is_current(&second));
    }

    #[test]
    fn test_at_most_one_current_handle() {
        let mut session = ConversationSession::new();
        let handles: Vec<_> = (0..5).map(|_| session.begin_request()).collect();
        let current: Vec<_> = handles.iter().filter(|h| session.is_current(h)).collect();
        assert_eq!(current.len(), 1);
        assert!(current[0].same_request(&handles[4]));
    }

    #[test]
    fn test_cancel_request_is_idempotent() {
        let mut session = ConversationSession::new();
        // No active request: no-op
        session.cancel_request();
        assert!(!session.has_active_request());

        let handle = session.begin_request();
        session.cancel_request();
        assert!(handle.is_cancelled());
        assert!(!session.has_active_request());

        // Second cancel is a no-op
        session.cancel_request();
        assert!(!session.has_active_request());
    }

    #[test]
    fn test_retire_clears_only_matching_handle() {
        let mut session = ConversationSession::new();
        let old = session.begin_request();
        let new = session.begin_request();

        session.retire(&old);
        assert!(session.is_current(&new));

        session.retire(&new);
        assert!(!session.has_active_request());
        // Retiring did not cancel the token
        assert!(!new.is_cancelled());
    }

    #[test]
    fn test_chunks_accumulate_in_arrival_order() {
        let (mut session, id) = session_with_placeholder();
        session.apply_chunk(id, "He");
        session.apply_chunk(id, "ll");
        session.apply_chunk(id, "o");

        let msg = &session.messages()[1];
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.status, MessageStatus::Streaming);
    }

    #[test]
    fn test_complete_replaces_accumulated_content() {
        let (mut session, id) = session_with_placeholder();
        session.apply_chunk(id, "Hell");
        let applied = session.apply_complete(
            id,
            "Hello!".to_string(),
            vec![Source {
                title: "Help Center".to_string(),
                url: "https://example.com/help".to_string(),
            }],
            Some(json!({"model": "agent-1"})),
        );

        assert!(applied);
        let msg = &session.messages()[1];
        assert_eq!(msg.content, "Hello!");
        assert_eq!(msg.status, MessageStatus::Complete);
        assert_eq!(msg.sources.len(), 1);
        assert!(msg.metadata.is_some());
    }

    #[test]
    fn test_terminal_message_rejects_further_events() {
        let (mut session, id) = session_with_placeholder();
        session.apply_complete(id, "done".to_string(), Vec::new(), None);

        session.apply_chunk(id, "late");
        session.apply_step(id, AgentStep::new(StepKind::Status, json!({})));
        let applied = session.apply_complete(id, "again".to_string(), Vec::new(), None);
        session.apply_error(id, &TransportError::ServiceUnavailable);

        assert!(!applied);
        let msg = &session.messages()[1];
        assert_eq!(msg.content, "done");
        assert_eq!(msg.status, MessageStatus::Complete);
        assert!(msg.steps.is_empty());
    }

    #[test]
    fn test_error_writes_template_not_raw_error() {
        let (mut session, id) = session_with_placeholder();
        session.apply_chunk(id, "partial");
        session.apply_error(id, &TransportError::QuotaExceeded);

        let msg = &session.messages()[1];
        assert_eq!(msg.status, MessageStatus::Errored);
        assert_eq!(msg.content, TransportError::QuotaExceeded.user_message());
    }

    #[test]
    fn test_steps_append_in_order_and_update_progress() {
        let (mut session, id) = session_with_placeholder();
        session.apply_step(id, AgentStep::new(StepKind::Status, json!({"text": "Thinking"})));
        assert_eq!(session.progress(), Some("Thinking"));

        session.apply_step(
            id,
            AgentStep::new(StepKind::ToolStart, json!({"tool": "case_lookup"})),
        );
        assert_eq!(session.progress(), Some("Using case_lookup"));

        session.apply_step(id, AgentStep::new(StepKind::ToolEnd, json!({})));
        assert_eq!(session.progress(), Some("Processing results"));

        let msg = &session.messages()[1];
        assert_eq!(msg.steps.len(), 3);
        assert_eq!(msg.steps[0].kind, StepKind::Status);
        assert_eq!(msg.steps[1].kind, StepKind::ToolStart);
        assert_eq!(msg.steps[2].kind, StepKind::ToolEnd);

        // Progress is cleared at terminal
        session.apply_complete(id, "done".to_string(), Vec::new(), None);
        assert_eq!(session.progress(), None);
    }

    #[test]
    fn test_events_for_unknown_message_are_noops() {
        let (mut session, _) = session_with_placeholder();
        let before = session.messages().to_vec();
        let ghost = Uuid::new_v4();

        session.apply_chunk(ghost, "x");
        session.apply_error(ghost, &TransportError::ServiceUnavailable);
        assert!(!session.apply_complete(ghost, "x".to_string(), Vec::new(), None));

        assert_eq!(session.messages().len(), before.len());
        assert_eq!(session.messages()[1].content, before[1].content);
    }
}
