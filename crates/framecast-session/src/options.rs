//! Session tuning knobs.

use std::time::Duration;

use framecast_protocols::{CaptureOptions, LaunchOptions, Viewport};

/// Options shared by every session of a server.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Viewport used when `start-session` omits or rejects dimensions.
    pub default_viewport: Viewport,
    /// Hard timeout for the initial navigation.
    pub start_timeout: Duration,
    /// Timeout for later `navigate` commands.
    pub navigate_timeout: Duration,
    pub jpeg_quality: u8,
    /// Optional floor between capture tick starts.
    pub min_frame_interval: Option<Duration>,
    pub user_agent: Option<String>,
    pub stealth: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_viewport: Viewport::default(),
            start_timeout: Duration::from_secs(60),
            navigate_timeout: Duration::from_secs(30),
            jpeg_quality: 80,
            min_frame_interval: None,
            user_agent: None,
            stealth: true,
        }
    }
}

impl SessionOptions {
    pub(crate) fn launch_options(&self, viewport: Viewport) -> LaunchOptions {
        LaunchOptions {
            viewport,
            user_agent: self.user_agent.clone(),
            stealth: self.stealth,
        }
    }

    pub(crate) fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            quality: self.jpeg_quality.clamp(1, 100),
        }
    }
}
