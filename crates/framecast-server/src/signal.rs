//! OS signal handling.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ServerError;

/// Fans OS termination signals out to whoever waits for shutdown.
/// Clones observe the same request.
#[derive(Clone, Default)]
pub struct SignalHandler {
    shutdown: CancellationToken,
}

impl SignalHandler {
    /// Create a new signal handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a graceful shutdown. Later calls are no-ops.
    pub fn request_shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            debug!("Shutdown requested");
        }
        self.shutdown.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolve once shutdown has been requested, including before the call.
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.cancelled().await
    }

    /// Install SIGTERM and SIGINT handlers.
    #[cfg(unix)]
    pub fn setup_os_signals(&self) -> Result<(), ServerError> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).map_err(|e| ServerError::SignalSetup(e.to_string()))?;
        let sigterm_handler = self.clone();
        tokio::spawn(async move {
            while sigterm.recv().await.is_some() {
                info!("Received SIGTERM");
                sigterm_handler.request_shutdown();
            }
        });

        let mut sigint =
            signal(SignalKind::interrupt()).map_err(|e| ServerError::SignalSetup(e.to_string()))?;
        let sigint_handler = self.clone();
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                info!("Received SIGINT");
                sigint_handler.request_shutdown();
            }
        });

        info!("OS signal handlers installed (SIGTERM, SIGINT)");
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn setup_os_signals(&self) -> Result<(), ServerError> {
        let handler = self.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C");
                handler.request_shutdown();
            }
        });

        info!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}
