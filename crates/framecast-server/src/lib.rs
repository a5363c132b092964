//! # Framecast Server
//!
//! HTTP/WebSocket front end of framecast.
//!
//! - `GET /ws` upgrades to a WebSocket; each socket gets its own
//!   [`Dispatcher`] and session.
//! - `GET /health` reports the number of live sessions.
//! - `GET /` serves an embedded viewer page.
//!
//! ## Usage
//!
//! ```ignore
//! use framecast_server::{FramecastServer, ServerOptions, SignalHandler};
//!
//! let server = FramecastServer::new(engine, SessionOptions::default(), ServerOptions::default());
//! let signals = SignalHandler::new();
//! signals.setup_os_signals()?;
//! server.run(&signals).await?;
//! ```

mod connection;
mod dispatcher;
mod error;
mod server;
mod signal;
mod supervisor;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use framecast_protocols::RenderEngine;
use framecast_session::SessionOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use server::{AppState, create_router};
pub use signal::SignalHandler;
pub use supervisor::Supervisor;

/// Listener and per-connection settings.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub outbound_buffer: usize,
    pub command_buffer: usize,
    /// Upper bound for destroying sessions and draining HTTP connections.
    pub shutdown_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            outbound_buffer: 16,
            command_buffer: 64,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerOptions {
    /// Get the `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The framecast HTTP server.
pub struct FramecastServer {
    options: ServerOptions,
    state: Arc<AppState>,
}

impl FramecastServer {
    /// Create a server around `engine`.
    pub fn new(engine: Arc<dyn RenderEngine>, session_options: SessionOptions, options: ServerOptions) -> Self {
        let state = Arc::new(AppState {
            engine,
            session_options,
            outbound_buffer: options.outbound_buffer,
            command_buffer: options.command_buffer,
            supervisor: Arc::new(Supervisor::new()),
        });
        Self { options, state }
    }

    /// Get the server options.
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Get the connection registry.
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.state.supervisor
    }

    /// Build the HTTP router.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.options.bind_addr();
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr.clone()))?;
        TcpListener::bind(socket_addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on `listener` until `shutdown` resolves, then stop accepting,
    /// destroy every session and wait for HTTP connections to drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        if let Ok(addr) = listener.local_addr() {
            info!("framecast listening on http://{}", addr);
        }

        let stop_accepting = CancellationToken::new();
        let router = self.router();
        let graceful = stop_accepting.clone().cancelled_owned();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router).with_graceful_shutdown(graceful).await
        });

        tokio::select! {
            result = &mut server => {
                // The server stopped on its own; still release whatever is running.
                self.state.supervisor.shutdown(self.options.shutdown_timeout).await;
                return match result {
                    Ok(result) => result.map_err(ServerError::from),
                    Err(e) => Err(ServerError::Serve(std::io::Error::other(e))),
                };
            }
            _ = shutdown => {}
        }

        info!("Shutting down: closing listener");
        stop_accepting.cancel();

        let destroyed = self.state.supervisor.shutdown(self.options.shutdown_timeout).await;
        info!("Destroyed {} session(s)", destroyed);

        match tokio::time::timeout(self.options.shutdown_timeout, server).await {
            Ok(Ok(result)) => result.map_err(ServerError::from)?,
            Ok(Err(e)) => return Err(ServerError::Serve(std::io::Error::other(e))),
            Err(_) => warn!("HTTP connections did not drain within {:?}", self.options.shutdown_timeout),
        }

        info!("framecast stopped");
        Ok(())
    }

    /// Bind and serve until the signal handler requests shutdown.
    pub async fn run(&self, signals: &SignalHandler) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, signals.wait_for_shutdown()).await
    }
}
