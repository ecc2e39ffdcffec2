//! Conversation session management
//!
//! Request lifecycle, liveness guarding, and the conversation state reducer.

pub mod controller;
pub mod error;
pub mod handle;
pub mod liveness;
pub mod message;
pub mod session;

pub use controller::SessionController;
pub use error::TransportError;
pub use handle::RequestHandle;
pub use liveness::{LivenessGuard, LivenessToken};
pub use message::{AgentStep, Message, MessageStatus, Role, Source, StepKind};
pub use session::{ConversationSession, SharedSession};
