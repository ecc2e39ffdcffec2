//! Concierge conversation core
//!
//! The streaming session subsystem of the Concierge portal assistant:
//! request identity and supersession, cooperative cancellation, and ordered
//! application of streamed agent events into shared conversation state.
//!
//! The composition root is [`chat::SessionController`]; everything it talks
//! to (transport, persistence, monitoring) is a trait seam so hosts and tests
//! can swap implementations.

pub mod chat;
pub mod config;
pub mod monitor;
pub mod store;
pub mod transport;

pub use chat::{
    AgentStep, ConversationSession, LivenessToken, Message, MessageStatus, RequestHandle, Role,
    SessionController, Source, StepKind, TransportError,
};
pub use config::AgentEndpointConfig;
pub use monitor::{Monitor, MonitorEvent, NullMonitor, TracingMonitor};
pub use store::{MemoryStore, NullStore, TranscriptStore};
pub use transport::{SseTransport, StreamEvent, Transport};
