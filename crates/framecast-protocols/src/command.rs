//! Inbound client commands.
//!
//! On the wire every command is a JSON object of the form
//! `{"command": "<name>", "payload": <payload>}`.

use serde::{Deserialize, Serialize};

/// A command received from a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Launch a browser and start streaming `url`.
    StartSession(StartSessionRequest),
    /// Forward a pointer/keyboard/zoom event to the page.
    InputEvent(InputEvent),
    /// Change the viewport of the running page.
    Resize(ResizeRequest),
    /// Navigate the running page.
    Navigate(NavigateRequest),
    /// Stop streaming and release the browser.
    StopSession,
}

impl ClientCommand {
    /// Parse a command from its JSON text form.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::StartSession(_) => "start-session",
            ClientCommand::InputEvent(_) => "input-event",
            ClientCommand::Resize(_) => "resize",
            ClientCommand::Navigate(_) => "navigate",
            ClientCommand::StopSession => "stop-session",
        }
    }
}

/// Payload of `start-session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartSessionRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl StartSessionRequest {
    /// Create a request with the default viewport.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Payload of `resize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResizeRequest {
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// Payload of `navigate`: either `{"url": "..."}` or a bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NavigateRequest {
    Bare(String),
    Object { url: String },
}

impl NavigateRequest {
    /// Get the target URL.
    pub fn url(&self) -> &str {
        match self {
            NavigateRequest::Bare(url) => url,
            NavigateRequest::Object { url } => url,
        }
    }
}

/// Payload of `input-event`, as sent by the client.
///
/// The structure is loose; [`InputEvent::action`] turns it into a
/// typed [`InputAction`] or `None` when the event is unknown or incomplete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A validated input action ready to be dispatched to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Click { x: f64, y: f64 },
    MouseMove { x: f64, y: f64 },
    Scroll { x: f64, y: f64, delta_x: f64, delta_y: f64 },
    Zoom { scale: f64 },
    KeyDown { key: String },
    Type { text: String },
}

impl InputEvent {
    /// Resolve the event into an action, or `None` if it cannot be dispatched.
    pub fn action(&self) -> Option<InputAction> {
        match self.kind.as_str() {
            "click" => {
                let (x, y) = self.point()?;
                Some(InputAction::Click { x, y })
            }
            "mousemove" => {
                let (x, y) = self.point()?;
                Some(InputAction::MouseMove { x, y })
            }
            "scroll" => {
                let delta_x = finite(self.delta_x).unwrap_or(0.0);
                let delta_y = finite(self.delta_y).unwrap_or(0.0);
                if delta_x == 0.0 && delta_y == 0.0 {
                    return None;
                }
                let (x, y) = self.point().unwrap_or((0.0, 0.0));
                Some(InputAction::Scroll { x, y, delta_x, delta_y })
            }
            "zoom" => {
                let scale = finite(self.scale).filter(|s| *s > 0.0)?;
                Some(InputAction::Zoom { scale })
            }
            "keydown" => {
                let key = self.key.as_deref().filter(|k| !k.is_empty())?;
                Some(InputAction::KeyDown { key: key.to_string() })
            }
            "type" => {
                let text = self.text.as_deref().filter(|t| !t.is_empty())?;
                Some(InputAction::Type { text: text.to_string() })
            }
            _ => None,
        }
    }

    fn point(&self) -> Option<(f64, f64)> {
        Some((finite(self.x)?, finite(self.y)?))
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
