//! Transcript persistence collaborator
//!
//! Invoked fire-and-forget after a successful completion; failures are
//! logged by the caller and never surfaced as conversation errors.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chat::message::Message;

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Persist a snapshot of the full message list
    async fn persist(&self, messages: Vec<Message>) -> anyhow::Result<()>;
}

/// Store that keeps nothing
pub struct NullStore;

#[async_trait]
impl TranscriptStore for NullStore {
    async fn persist(&self, _messages: Vec<Message>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory store; the test double for persistence assertions
#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<Vec<Vec<Message>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Vec<Message>> {
        self.snapshots.lock().clone()
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn persist(&self, messages: Vec<Message>) -> anyhow::Result<()> {
        self.snapshots.lock().push(messages);
        Ok(())
    }
}
