//! Render engine abstraction.
//!
//! A [`RenderEngine`] launches isolated browser instances; each launch yields a
//! [`PageHandle`] owning one browser process and one page inside it.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::command::InputAction;
use crate::error::EngineError;
use crate::event::PageEvent;
use crate::types::Viewport;

/// How long a navigation waits before it is considered done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Wait until the network is mostly idle.
    NetworkAlmostIdle,
    /// Wait for `DOMContentLoaded` only.
    DomContentLoaded,
}

/// Options applied when a new page handle is acquired.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub stealth: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            user_agent: None,
            stealth: true,
        }
    }
}

/// Options for a single frame capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self { quality: 80 }
    }
}

/// Launches browser instances.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Launch a browser, open a page and apply `options`.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageHandle>, EngineError>;
}

/// One browser process plus one open page.
///
/// Only the owning session may call into a handle. `close` consumes the
/// handle so a released page can never be used again.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), EngineError>;

    async fn navigate(&self, url: &str, wait: WaitPolicy) -> Result<(), EngineError>;

    /// Capture a still JPEG frame, returned base64-encoded.
    async fn capture_frame(&self, options: &CaptureOptions) -> Result<String, EngineError>;

    async fn dispatch(&self, action: &InputAction) -> Result<(), EngineError>;

    /// Subscribe to load and console events of the page.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Release the page and its browser process. Failures are reported but the
    /// handle is gone either way.
    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}
