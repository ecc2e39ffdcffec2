//! Transport boundary to the backend conversational agent
//!
//! A transport turns one outgoing message (plus history) into an ordered
//! event stream: zero-or-more chunks and steps, then exactly one terminal
//! (`Complete` or `Error`). The agent itself is opaque; the controller only
//! consumes this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::error::TransportError;
use crate::chat::message::{AgentStep, Message, Source};

pub mod sse;

pub use sse::SseTransport;

/// Events produced by an open agent stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    /// One incremental fragment of assistant text
    Chunk { delta: String },
    /// Structured agent progress, distinct from text content
    Step { step: AgentStep },
    /// Terminal success: the authoritative final text plus attachments
    Complete {
        text: String,
        #[serde(default)]
        sources: Vec<Source>,
        #[serde(default)]
        metadata: Option<Value>,
    },
    /// Terminal failure, already classified
    Error { error: TransportError },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// One-shot stream factory for the agent backend.
///
/// The cancellation token is cooperative: implementations should abort their
/// underlying I/O when it fires, but the caller's correctness does not depend
/// on them doing so promptly.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(
        &self,
        message: &str,
        history: &[Message],
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, TransportError>;
}
