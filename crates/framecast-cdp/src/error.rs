//! CDP error types.

use framecast_protocols::EngineError;
use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    /// Failed to connect to the browser.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No usable browser executable.
    #[error("Browser not found: {0}")]
    BrowserNotFound(String),

    /// Browser process failed to start or never announced its endpoint.
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Navigation failed.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Session closed.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<CdpError> for EngineError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::BrowserNotFound(msg) => EngineError::BrowserNotFound(msg),
            CdpError::LaunchFailed(msg) => EngineError::LaunchFailed(msg),
            CdpError::ConnectionFailed(msg) | CdpError::WebSocket(msg) => {
                EngineError::ConnectionFailed(msg)
            }
            CdpError::NavigationFailed(msg) => EngineError::NavigationFailed(msg),
            CdpError::Timeout(msg) => EngineError::Protocol(format!("Timeout: {}", msg)),
            CdpError::SessionClosed => EngineError::Closed,
            CdpError::Io(e) => EngineError::LaunchFailed(e.to_string()),
            other => EngineError::Protocol(other.to_string()),
        }
    }
}
