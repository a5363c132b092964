//! Outbound session events and raw page events.

use serde::{Deserialize, Serialize};

/// An event emitted by a session towards its client.
///
/// Serialized as `{"event": "<name>", "payload": <payload>}`; unit variants
/// carry no payload field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionStarted,
    /// Base64-encoded JPEG frame.
    Frame(String),
    LoadingStart,
    LoadingEnd,
    Error(String),
}

impl SessionEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted => "session-started",
            SessionEvent::Frame(_) => "frame",
            SessionEvent::LoadingStart => "loading-start",
            SessionEvent::LoadingEnd => "loading-end",
            SessionEvent::Error(_) => "error",
        }
    }

    /// Serialize to the outbound wire format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Create an error event.
    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error(message.into())
    }
}

/// Low-level event reported by a page handle.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    LoadStart,
    LoadEnd,
    Console { level: String, text: String },
}
