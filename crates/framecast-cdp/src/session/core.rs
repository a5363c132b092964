//! Core session struct and CDP command dispatch.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::debug;

use crate::client::Transport;
use crate::error::CdpError;
use crate::protocol::{CdpEvent, ScreenshotFormat};

/// A flattened session attached to a single page target.
pub struct PageSession {
    /// Target ID; also the id of the page's main frame.
    pub(super) target_id: String,
    /// Session ID for this target.
    pub(super) session_id: String,
    /// Shared with the owning client.
    pub(super) transport: Arc<Transport>,
    pub(super) events: broadcast::Sender<CdpEvent>,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        transport: Arc<Transport>,
        events: broadcast::Sender<CdpEvent>,
    ) -> Self {
        Self {
            target_id,
            session_id,
            transport,
            events,
        }
    }

    /// Get the target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get the session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Subscribe to raw CDP events of this page.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport.call(method, params, Some(&self.session_id)).await
    }

    /// Enable the domains the streamer relies on.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("Page.setLifecycleEventsEnabled", Some(json!({"enabled": true})))
            .await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Capture the visible viewport. Returns base64 image data.
    pub async fn screenshot(
        &self,
        format: ScreenshotFormat,
        quality: Option<u8>,
    ) -> Result<String, CdpError> {
        let mut params = json!({
            "format": format,
            "fromSurface": true,
            "captureBeyondViewport": false,
        });

        if let Some(q) = quality {
            params["quality"] = json!(q);
        }

        let result = self.call("Page.captureScreenshot", Some(params)).await?;

        result["data"]
            .as_str()
            .filter(|data| !data.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| CdpError::InvalidResponse("Missing screenshot data".to_string()))
    }

    /// Detach from the target; the page itself stays open.
    pub async fn detach(&self) -> Result<(), CdpError> {
        self.transport.unregister_session(&self.session_id);
        self.transport
            .call(
                "Target.detachFromTarget",
                Some(json!({"sessionId": self.session_id})),
                None,
            )
            .await?;
        Ok(())
    }
}
