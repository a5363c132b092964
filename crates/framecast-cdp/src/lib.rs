//! Chrome DevTools Protocol render engine.
//!
//! Every [`ChromeEngine::launch`](framecast_protocols::RenderEngine::launch)
//! spawns a dedicated Chromium-family process with a throwaway profile,
//! connects to its DevTools WebSocket and opens a single page. The resulting
//! [`ChromePage`] owns the process; closing or dropping it terminates the
//! browser.
//!
//! ```rust,ignore
//! let engine = ChromeEngine::new(LauncherConfig::default());
//! let page = engine.launch(&LaunchOptions::default()).await?;
//! page.navigate("https://example.com", WaitPolicy::NetworkAlmostIdle).await?;
//! let jpeg_base64 = page.capture_frame(&CaptureOptions::default()).await?;
//! page.close().await?;
//! ```

mod client;
mod engine;
mod error;
mod launcher;
mod protocol;
mod session;
mod stealth;

#[cfg(test)]
mod test_support;

pub use client::CdpClient;
pub use engine::{ChromeEngine, ChromePage};
pub use error::CdpError;
pub use launcher::{BrowserProcess, LauncherConfig, find_chrome};
pub use protocol::*;
pub use session::PageSession;
pub use stealth::STEALTH_SCRIPT;
