//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::CdpError;
use crate::protocol::{CdpEvent, CdpRequest, CdpResponse};
use crate::session::PageSession;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;
type HandlerMap = Arc<Mutex<HashMap<String, broadcast::Sender<CdpEvent>>>>;

/// Timeout applied to every individual CDP command.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the per-session raw event channel.
const SESSION_EVENT_CAPACITY: usize = 256;

/// Request/response plumbing shared by the client and its page sessions.
pub(crate) struct Transport {
    ws_tx: tokio::sync::Mutex<WsSink>,
    request_id: AtomicU64,
    pending: PendingMap,
    handlers: HandlerMap,
    closed: Arc<AtomicBool>,
    call_timeout: Duration,
}

impl Transport {
    /// Send a CDP command and wait for its response.
    pub(crate) async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CdpError::SessionClosed);
        }

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let sent = {
            let mut ws = self.ws_tx.lock().await;
            ws.send(Message::Text(json.into())).await
        };
        if let Err(e) = sent {
            self.pending.lock().remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }

    pub(crate) fn register_session(&self, session_id: &str) -> broadcast::Sender<CdpEvent> {
        let (tx, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        self.handlers.lock().insert(session_id.to_string(), tx.clone());
        tx
    }

    pub(crate) fn unregister_session(&self, session_id: &str) {
        self.handlers.lock().remove(session_id);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// CDP client connected to one browser process.
pub struct CdpClient {
    transport: Arc<Transport>,
    ws_url: String,
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to the browser-level DevTools WebSocket.
    ///
    /// ```rust,ignore
    /// let client = CdpClient::connect("ws://127.0.0.1:41011/devtools/browser/0c1f...").await?;
    /// ```
    pub async fn connect(ws_url: &str) -> Result<Self, CdpError> {
        Self::connect_with_timeout(ws_url, DEFAULT_CALL_TIMEOUT).await
    }

    /// Connect with a custom per-call timeout.
    pub async fn connect_with_timeout(ws_url: &str, call_timeout: Duration) -> Result<Self, CdpError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let recv_task = {
            let pending = pending.clone();
            let handlers = handlers.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, &pending, &handlers).await;
                closed.store(true, Ordering::SeqCst);
                // Dropping the senders wakes every waiter with SessionClosed.
                pending.lock().clear();
                handlers.lock().clear();
            })
        };

        debug!("CDP client connected to {}", ws_url);

        Ok(Self {
            transport: Arc::new(Transport {
                ws_tx: tokio::sync::Mutex::new(ws_sink),
                request_id: AtomicU64::new(1),
                pending,
                handlers,
                closed,
                call_timeout,
            }),
            ws_url: ws_url.to_string(),
            recv_task,
        })
    }

    /// WebSocket receive loop.
    async fn receive_loop(mut ws_source: WsSource, pending: &PendingMap, handlers: &HandlerMap) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {:.200}", text.as_str());
                    match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => Self::route(resp, pending, handlers),
                        Err(e) => warn!("Failed to parse CDP message: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("CDP WebSocket closed");
                    break;
                }
                Err(e) => {
                    debug!("CDP WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    }

    fn route(resp: CdpResponse, pending: &PendingMap, handlers: &HandlerMap) {
        if let Some(id) = resp.id {
            let waiter = pending.lock().remove(&id);
            if let Some(tx) = waiter {
                let result = match resp.error {
                    Some(error) => Err(CdpError::Protocol {
                        code: error.code,
                        message: error.message,
                    }),
                    None => Ok(resp.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(result);
            }
        } else if let Some((session_id, event)) = CdpEvent::from_response(resp) {
            let handlers = handlers.lock();
            if let Some(tx) = handlers.get(&session_id) {
                // No receivers is fine: nobody is waiting on this page right now.
                let _ = tx.send(event);
            }
        }
    }

    /// Send a browser-level CDP command.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport.call(method, params, None).await
    }

    /// Get the WebSocket URL.
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Whether the underlying WebSocket is gone.
    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Open a blank page and attach a flattened session to it.
    pub async fn create_page(&self) -> Result<PageSession, CdpError> {
        let result = self
            .call("Target.createTarget", Some(json!({"url": "about:blank"})))
            .await?;
        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))?
            .to_string();

        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
            )
            .await?;
        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let events = self.transport.register_session(&session_id);
        debug!("Attached to target {} (session {})", target_id, session_id);

        Ok(PageSession::new(target_id, session_id, self.transport.clone(), events))
    }

    /// Ask the browser to exit.
    pub async fn close_browser(&self) -> Result<(), CdpError> {
        match self.call("Browser.close", None).await {
            Ok(_) => Ok(()),
            // The socket usually dies before the response makes it back.
            Err(CdpError::SessionClosed) | Err(CdpError::WebSocket(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
