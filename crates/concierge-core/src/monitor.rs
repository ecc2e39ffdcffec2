//! Monitoring collaborator
//!
//! Purely observational: the controller reports what happened at fixed
//! extension points (request start, event received, terminal reached,
//! failure classified) and nothing here may influence control flow.

use uuid::Uuid;

/// Lifecycle notifications emitted by the session controller
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    RequestStarted { request_id: Uuid },
    EventReceived { request_id: Uuid },
    TerminalReached { request_id: Uuid },
    Failed { request_id: Uuid, code: &'static str },
}

pub trait Monitor: Send + Sync {
    fn record(&self, event: MonitorEvent);
}

/// Default monitor that logs through tracing
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn record(&self, event: MonitorEvent) {
        tracing::debug!("session event: {:?}", event);
    }
}

/// Discards everything; useful in tests
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn record(&self, _event: MonitorEvent) {}
}
