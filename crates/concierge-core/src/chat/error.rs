//! Error taxonomy for the agent transport
//!
//! Every transport-level failure is classified here and converted into a
//! terminal error event on the same guarded reducer path as success; nothing
//! in this subsystem throws synchronously to its caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified failures from the backend agent transport
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportError {
    /// Rate or quota limit hit upstream; transient
    #[error("quota exceeded")]
    QuotaExceeded,
    /// Backend dependency outage; transient
    #[error("service unavailable")]
    ServiceUnavailable,
    /// Connection lost mid-stream; terminal for the current message only
    #[error("network failure: {0}")]
    Network(String),
    /// Cooperative cancellation; not an error, produces no user message
    #[error("request cancelled")]
    Cancelled,
    /// Fallback for anything unclassified
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Machine-readable classification code for monitoring
    pub fn code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Network(_) => "network",
            Self::Cancelled => "cancelled",
            Self::Other(_) => "unknown",
        }
    }

    /// User-facing message written into the errored assistant message.
    ///
    /// Never the raw error string; wording is distinct per classification so
    /// rate limits and outages read differently.
    pub fn user_message(&self) -> String {
        match self {
            Self::QuotaExceeded => {
                "The assistant is handling a lot of requests right now. \
                 Please try again in a moment."
            }
            Self::ServiceUnavailable => {
                "The assistant service is temporarily unavailable. \
                 Please try again later."
            }
            Self::Network(_) => {
                "The connection was interrupted before the response finished. \
                 Please try again."
            }
            Self::Cancelled => "Request cancelled.",
            Self::Other(_) => {
                "Something went wrong while generating a response. \
                 Please try again."
            }
        }
        .to_string()
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Classify an HTTP response status from the agent endpoint
    pub fn classify_status(status: u16) -> Self {
        match status {
            429 => Self::QuotaExceeded,
            500..=599 => Self::ServiceUnavailable,
            other => Self::Other(format!("unexpected status {other}")),
        }
    }

    /// Classify a machine-readable code from a wire-level error event
    pub fn from_code(code: &str, message: String) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "QUOTA_EXCEEDED" | "RATE_LIMITED" => Self::QuotaExceeded,
            "SERVICE_UNAVAILABLE" | "OVERLOADED" => Self::ServiceUnavailable,
            "NETWORK" => Self::Network(message),
            "CANCELLED" => Self::Cancelled,
            _ => Self::Other(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            TransportError::classify_status(429),
            TransportError::QuotaExceeded
        );
        assert_eq!(
            TransportError::classify_status(503),
            TransportError::ServiceUnavailable
        );
        assert_eq!(
            TransportError::classify_status(500),
            TransportError::ServiceUnavailable
        );
        assert!(matches!(
            TransportError::classify_status(404),
            TransportError::Other(_)
        ));
    }

    #[test]
    fn test_from_code_is_case_insensitive() {
        assert_eq!(
            TransportError::from_code("quota_exceeded", String::new()),
            TransportError::QuotaExceeded
        );
        assert_eq!(
            TransportError::from_code("OVERLOADED", String::new()),
            TransportError::ServiceUnavailable
        );
        assert_eq!(
            TransportError::from_code("CANCELLED", String::new()),
            TransportError::Cancelled
        );
        assert_eq!(
            TransportError::from_code("weird", "boom".to_string()),
            TransportError::Other("boom".to_string())
        );
    }

    #[test]
    fn test_user_messages_are_distinct_per_class() {
        let quota = TransportError::QuotaExceeded.user_message();
        let outage = TransportError::ServiceUnavailable.user_message();
        let network = TransportError::Network("reset".into()).user_message();
        assert_ne!(quota, outage);
        assert_ne!(outage, network);
        // Raw error detail never leaks into the user-facing text
        assert!(!network.contains("reset"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(TransportError::QuotaExceeded.code(), "quota_exceeded");
        assert_eq!(TransportError::Cancelled.code(), "cancelled");
        assert_eq!(TransportError::Other("x".into()).code(), "unknown");
    }
}
