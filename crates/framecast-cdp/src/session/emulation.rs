//! Viewport, user agent and document script setup.

use serde_json::json;
use tracing::debug;

use crate::error::CdpError;

use super::core::PageSession;

impl PageSession {
    /// Resize the rendered viewport.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<(), CdpError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;
        debug!("Viewport set to {}x{}", width, height);
        Ok(())
    }

    /// Override the user agent for this page.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<(), CdpError> {
        self.call(
            "Network.setUserAgentOverride",
            Some(json!({"userAgent": user_agent})),
        )
        .await?;
        Ok(())
    }

    /// Pinch-zoom style page scale.
    pub async fn set_page_scale(&self, scale: f64) -> Result<(), CdpError> {
        self.call(
            "Emulation.setPageScaleFactor",
            Some(json!({"pageScaleFactor": scale})),
        )
        .await?;
        Ok(())
    }

    /// Run `source` in every new document before any page script.
    pub async fn add_init_script(&self, source: &str) -> Result<String, CdpError> {
        let result = self
            .call(
                "Page.addScriptToEvaluateOnNewDocument",
                Some(json!({"source": source})),
            )
            .await?;
        Ok(result["identifier"].as_str().unwrap_or_default().to_string())
    }
}
