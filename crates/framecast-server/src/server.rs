//! HTTP routing and embedded viewer assets.

use std::sync::Arc;

use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use framecast_protocols::RenderEngine;
use framecast_session::SessionOptions;
use rust_embed::RustEmbed;

use crate::connection::handle_socket;
use crate::supervisor::Supervisor;

/// Embedded viewer page.
#[derive(RustEmbed)]
#[folder = "src/static/"]
struct StaticAssets;

/// State shared by all request handlers.
pub struct AppState {
    pub engine: Arc<dyn RenderEngine>,
    pub session_options: SessionOptions,
    /// Capacity of each connection's outbound event queue.
    pub outbound_buffer: usize,
    /// Capacity of each connection's command queue.
    pub command_buffer: usize,
    pub supervisor: Arc<Supervisor>,
}

/// Create the router for the viewer, the WebSocket and the health check.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/app.js", get(serve_js))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn serve_index() -> Response {
    serve_asset("index.html", "text/html; charset=utf-8")
}

async fn serve_js() -> Response {
    serve_asset("app.js", "application/javascript")
}

fn serve_asset(path: &str, content_type: &'static str) -> Response {
    match StaticAssets::get(path) {
        Some(content) => (
            [(header::CONTENT_TYPE, content_type)],
            content.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": "ok",
            "active_sessions": state.supervisor.len(),
            "version": env!("CARGO_PKG_VERSION"),
        })
        .to_string(),
    )
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
