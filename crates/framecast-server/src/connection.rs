//! WebSocket connection handling.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use framecast_session::{EventSink, Session};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::server::AppState;

/// How long the writer may take to flush queued events after the session
/// is gone.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Serve one client: a writer task drains the session's events onto the
/// socket while this task reads commands, until either side goes away.
pub(crate) async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (sink, mut events) = EventSink::channel(state.outbound_buffer);
    let session = Session::new(
        conn_id.clone(),
        state.engine.clone(),
        state.session_options.clone(),
        sink.clone(),
    );
    let dispatcher = Dispatcher::spawn(session, sink, state.command_buffer);
    state.supervisor.register(dispatcher.clone());
    info!("[{}] WebSocket connection established", conn_id);

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = conn_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!("[{}] Failed to encode {} event: {}", writer_id, event.name(), e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                debug!("[{}] Send failed: {}", writer_id, e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            _ = &mut writer, if !writer_done => {
                debug!("[{}] Writer ended", conn_id);
                writer_done = true;
                break;
            }
            _ = dispatcher.closed() => break,
            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => dispatcher.handle_text(text.as_str()).await,
                Some(Ok(Message::Binary(_))) => {
                    debug!("[{}] Ignoring binary message", conn_id);
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("[{}] WebSocket connection closed", conn_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("[{}] WebSocket error: {}", conn_id, e);
                    break;
                }
            },
        }
    }

    dispatcher.shutdown().await;
    state.supervisor.remove(&conn_id);

    // Dropping the last event sink ends the writer, which then closes the socket.
    drop(dispatcher);
    if !writer_done && tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
    debug!("[{}] Connection removed", conn_id);
}
