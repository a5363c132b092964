//! Session errors.

use thiserror::Error;

use super::EngineError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Caller-correctable input, rejected before any engine call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Engine launch or initial navigation failed.
    #[error("Session start failed: {0}")]
    SessionStartFailed(String),

    /// Operation attempted without an active page.
    #[error("Engine unavailable")]
    EngineUnavailable,

    #[error("Input dispatch failed: {0}")]
    TransientInputFailure(#[source] EngineError),

    #[error("Frame capture failed: {0}")]
    CaptureFailure(#[source] EngineError),
}

impl SessionError {
    /// Wrap the cause of a failed start.
    pub fn start_failed(cause: impl std::fmt::Display) -> Self {
        SessionError::SessionStartFailed(cause.to_string())
    }
}
