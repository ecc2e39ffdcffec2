//! SSE (Server-Sent Events) transport to the agent endpoint
//!
//! Streams the agent's response over HTTP, handling partial lines and
//! buffering, and maps wire events onto [`StreamEvent`]s. The read loop
//! watches the cancellation token and stops emitting the moment it fires.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chat::error::TransportError;
use crate::chat::message::{AgentStep, Message, Source, StepKind};
use crate::config::AgentEndpointConfig;

use super::{StreamEvent, Transport};

/// Production transport for the portal's conversational agent
pub struct SseTransport {
    client: reqwest::Client,
    config: AgentEndpointConfig,
}

impl SseTransport {
    pub fn new(config: AgentEndpointConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(
        &self,
        message: &str,
        history: &[Message],
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, TransportError> {
        let body = json!({
            "message": message,
            "history": history,
        });

        let url = format!("{}/v1/chat/stream", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::classify_status(status.as_u16()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut lines = SseLineBuffer::new();
            let mut terminal_sent = false;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("agent stream cancelled");
                        break;
                    }
                    next = bytes.next() => match next {
                        Some(Ok(chunk)) => {
                            for data in lines.push(&chunk) {
                                match parse_sse_data(&data) {
                                    Some(event) => {
                                        let terminal = event.is_terminal();
                                        let _ = tx.send(event);
                                        if terminal {
                                            terminal_sent = true;
                                        }
                                    }
                                    None => continue,
                                }
                                if terminal_sent {
                                    break;
                                }
                            }
                            if terminal_sent {
                                break;
                            }
                        }
                        Some(Err(err)) => {
                            let _ = tx.send(StreamEvent::Error {
                                error: TransportError::Network(err.to_string()),
                            });
                            break;
                        }
                        None => {
                            // EOF before a terminal event breaks the contract;
                            // synthesize the terminal here so the consumer
                            // always sees exactly one.
                            if !terminal_sent {
                                let _ = tx.send(StreamEvent::Error {
                                    error: TransportError::Network(
                                        "stream ended before completion".to_string(),
                                    ),
                                });
                            }
                            break;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Accumulates raw bytes and yields the payloads of complete `data:` lines
struct SseLineBuffer {
    partial: String,
}

impl SseLineBuffer {
    fn new() -> Self {
        Self {
            partial: String::new(),
        }
    }

    fn push(&mut self, bytes: &Bytes) -> Vec<String> {
        self.partial.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end();
            // Skip blank separators and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data: ") {
                out.push(data.to_string());
            }
        }
        out
    }
}

/// Map one SSE data payload onto a stream event.
///
/// Wire format: JSON objects tagged by `type` (`chunk`, `step`, `complete`,
/// `error`); the `[DONE]` marker and unknown types are skipped.
fn parse_sse_data(data: &str) -> Option<StreamEvent> {
    if data == "[DONE]" {
        return None;
    }

    let event: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(err) => {
            warn!("unparseable SSE payload ({err}): {data}");
            return None;
        }
    };

    match event.get("type").and_then(Value::as_str) {
        Some("chunk") => {
            let delta = event.get("delta").and_then(Value::as_str)?.to_string();
            Some(StreamEvent::Chunk { delta })
        }
        Some("step") => {
            let kind = event
                .get("step_type")
                .and_then(Value::as_str)
                .map(StepKind::from)
                .unwrap_or(StepKind::Status);
            let payload = event.get("payload").cloned().unwrap_or(Value::Null);
            Some(StreamEvent::Step {
                step: AgentStep::new(kind, payload),
            })
        }
        Some("complete") => {
            let text = event
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let sources = event
                .get("sources")
                .cloned()
                .map(|v| serde_json::from_value::<Vec<Source>>(v).unwrap_or_default())
                .unwrap_or_default();
            let metadata = event.get("metadata").filter(|m| !m.is_null()).cloned();
            Some(StreamEvent::Complete {
                text,
                sources,
                metadata,
            })
        }
        Some("error") => {
            let code = event.get("code").and_then(Value::as_str).unwrap_or("");
            let message = event
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("agent error")
                .to_string();
            Some(StreamEvent::Error {
                error: TransportError::from_code(code, message),
            })
        }
        other => {
            debug!("ignoring SSE event type {:?}", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_client_from_default_config() {
        let transport = SseTransport::new(AgentEndpointConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_line_buffer_handles_partial_lines() {
        let mut buffer = SseLineBuffer::new();

        let first = buffer.push(&Bytes::from_static(b"data: {\"type\":\"chu"));
        assert!(first.is_empty());

        let second = buffer.push(&Bytes::from_static(b"nk\",\"delta\":\"hi\"}\n\n"));
        assert_eq!(second, vec!["{\"type\":\"chunk\",\"delta\":\"hi\"}"]);
    }

    #[test]
    fn test_line_buffer_skips_comments_and_blanks() {
        let mut buffer = SseLineBuffer::new();
        let out = buffer.push(&Bytes::from_static(b": keep-alive\n\ndata: x\n"));
        assert_eq!(out, vec!["x"]);
    }

    #[test]
    fn test_line_buffer_yields_multiple_events_per_chunk() {
        let mut buffer = SseLineBuffer::new();
        let out = buffer.push(&Bytes::from_static(b"data: a\n\ndata: b\n\n"));
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_chunk() {
        let event = parse_sse_data(r#"{"type":"chunk","delta":"He"}"#).unwrap();
        assert!(matches!(event, StreamEvent::Chunk { delta } if delta == "He"));
    }

    #[test]
    fn test_parse_step() {
        let event =
            parse_sse_data(r#"{"type":"step","step_type":"tool_start","payload":{"tool":"kb"}}"#)
                .unwrap();
        match event {
            StreamEvent::Step { step } => {
                assert_eq!(step.kind, StepKind::ToolStart);
                assert_eq!(step.payload["tool"], "kb");
            }
            other => panic!("expected step, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_complete_with_sources() {
        let event = parse_sse_data(
            r#"{"type":"complete","text":"Hello!","sources":[{"title":"KB","url":"https://example.com"}],"metadata":{"model":"agent-1"}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::Complete {
                text,
                sources,
                metadata,
            } => {
                assert_eq!(text, "Hello!");
                assert_eq!(sources.len(), 1);
                assert_eq!(metadata.unwrap()["model"], "agent-1");
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_maps_code() {
        let event =
            parse_sse_data(r#"{"type":"error","code":"QUOTA_EXCEEDED","message":"slow down"}"#)
                .unwrap();
        assert!(matches!(
            event,
            StreamEvent::Error {
                error: TransportError::QuotaExceeded
            }
        ));
    }

    #[test]
    fn test_done_marker_and_unknown_types_are_skipped() {
        assert!(parse_sse_data("[DONE]").is_none());
        assert!(parse_sse_data(r#"{"type":"heartbeat"}"#).is_none());
        assert!(parse_sse_data("not json").is_none());
    }
}
