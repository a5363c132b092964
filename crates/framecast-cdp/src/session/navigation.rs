//! Navigation operations for CDP page session.

use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::error::CdpError;

use super::core::PageSession;

impl PageSession {
    /// Navigate to `url` and wait until the main frame reports the lifecycle
    /// event `wait_for` (see [`crate::lifecycle`]).
    ///
    /// No timeout is applied here beyond the per-command one; callers bound the
    /// whole navigation.
    pub async fn navigate(&self, url: &str, wait_for: &str) -> Result<(), CdpError> {
        // Subscribe before navigating so the lifecycle event cannot be missed.
        let mut events = self.subscribe();

        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(format!("{} ({})", error, url)));
        }

        let frame_id = result["frameId"]
            .as_str()
            .unwrap_or(&self.target_id)
            .to_string();

        // Same-document navigations have no loader and emit no lifecycle events.
        let Some(loader_id) = result.get("loaderId").and_then(Value::as_str) else {
            debug!("Same-document navigation to {}", url);
            return Ok(());
        };

        loop {
            match events.recv().await {
                Ok(event) if is_lifecycle_event(&event.method, &event.params, &frame_id, loader_id, wait_for) => {
                    debug!("Navigated to {} ({})", url, wait_for);
                    return Ok(());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Navigation wait lagged by {} events", skipped);
                }
                Err(RecvError::Closed) => return Err(CdpError::SessionClosed),
            }
        }
    }
}

pub(super) fn is_lifecycle_event(
    method: &str,
    params: &Value,
    frame_id: &str,
    loader_id: &str,
    name: &str,
) -> bool {
    if method != "Page.lifecycleEvent" {
        return false;
    }
    let field = |key: &str| params.get(key).and_then(Value::as_str);
    field("frameId") == Some(frame_id)
        && field("name") == Some(name)
        && field("loaderId").is_none_or(|id| id == loader_id)
}
