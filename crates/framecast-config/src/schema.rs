//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Capacity of the per-connection outbound event queue.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Capacity of the per-connection inbound command queue.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
            command_buffer: default_command_buffer(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Get the `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_outbound_buffer() -> usize {
    16
}

fn default_command_buffer() -> usize {
    64
}

fn default_shutdown_timeout() -> u64 {
    5
}

/// Browser process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Explicit browser executable. Environment overrides win over this.
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Identifying request signature sent with every page request.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Install rendering-fidelity countermeasures on every new document.
    #[serde(default = "default_true")]
    pub stealth: bool,

    /// Pass `--no-sandbox`; required when running as root in containers.
    #[serde(default = "default_true")]
    pub no_sandbox: bool,

    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            user_agent: None,
            stealth: true,
            no_sandbox: true,
            extra_args: Vec::new(),
            launch_timeout_secs: default_launch_timeout(),
        }
    }
}

impl BrowserConfig {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_launch_timeout() -> u64 {
    20
}

/// Per-session streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_width")]
    pub default_width: u32,

    #[serde(default = "default_height")]
    pub default_height: u32,

    /// Hard timeout for launch plus initial navigation.
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,

    #[serde(default = "default_navigate_timeout")]
    pub navigate_timeout_secs: u64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Optional floor delay between capture ticks. Zero disables it.
    #[serde(default)]
    pub min_frame_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_width: default_width(),
            default_height: default_height(),
            start_timeout_secs: default_start_timeout(),
            navigate_timeout_secs: default_navigate_timeout(),
            jpeg_quality: default_jpeg_quality(),
            min_frame_interval_ms: 0,
        }
    }
}

impl SessionConfig {
    /// Hard limit on the initial navigation.
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn navigate_timeout(&self) -> Duration {
        Duration::from_secs(self.navigate_timeout_secs)
    }

    pub fn min_frame_interval(&self) -> Option<Duration> {
        (self.min_frame_interval_ms > 0).then(|| Duration::from_millis(self.min_frame_interval_ms))
    }
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_start_timeout() -> u64 {
    60
}

fn default_navigate_timeout() -> u64 {
    30
}

fn default_jpeg_quality() -> u8 {
    80
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; console only when unset.
    #[serde(default)]
    pub file_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
