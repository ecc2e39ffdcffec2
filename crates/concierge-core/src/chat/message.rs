//! Conversation data model
//!
//! Messages are the only shared mutable resource in this subsystem; they are
//! mutated exclusively through the guarded reducer in [`super::session`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle state of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Errored,
}

impl MessageStatus {
    /// Terminal messages are immutable
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Errored)
    }
}

/// A citation attached to a completed assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// Kind of intermediate agent progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Status,
    ToolStart,
    ToolEnd,
    Other(String),
}

impl From<&str> for StepKind {
    fn from(wire: &str) -> Self {
        match wire {
            "status" => Self::Status,
            "tool_start" => Self::ToolStart,
            "tool_end" => Self::ToolEnd,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One structured progress event from the agent, distinct from text content
///
/// Steps are append-only and kept in arrival order; they are never reordered
/// or deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    pub kind: StepKind,
    #[serde(default)]
    pub payload: Value,
}

impl AgentStep {
    pub fn new(kind: StepKind, payload: Value) -> Self {
        Self { kind, payload }
    }
}

/// One entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<AgentStep>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A user message, complete as soon as it is created
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            metadata: None,
            steps: Vec::new(),
            status: MessageStatus::Complete,
            created_at: Utc::now(),
        }
    }

    /// The assistant placeholder appended alongside a user message; it stays
    /// `Pending` until the first chunk arrives
    pub fn assistant_placeholder() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            content: String::new(),
            sources: Vec::new(),
            metadata: None,
            steps: Vec::new(),
            status: MessageStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
