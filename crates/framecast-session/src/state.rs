//! Session lifecycle states.

use std::fmt;

/// Lifecycle state of a [`Session`](crate::Session).
///
/// `Idle → Starting → Streaming → Stopping → Idle`, with `Closed` terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Streaming,
    Stopping,
    Closed,
}

impl SessionState {
    /// Get the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Stopping => "stopping",
            SessionState::Closed => "closed",
        }
    }

    /// Whether no further work is accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
