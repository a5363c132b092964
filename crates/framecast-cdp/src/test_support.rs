//! In-process fake DevTools endpoint for tests.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// What the fake browser does in response to one command.
pub(crate) enum Reply {
    Result(Value),
    Error(i64, &'static str),
    /// Respond, then push events on the same session.
    ResultThenEvents(Value, Vec<(&'static str, Value)>),
    /// Never answer.
    Silent,
}

pub(crate) struct FakeBrowser {
    pub ws_url: String,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl FakeBrowser {
    /// Every call is recorded as `(method, params)`.
    pub(crate) fn method_names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub(crate) fn params_of(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

/// Spawn a fake browser answering each command through `handler`.
pub(crate) async fn spawn_fake_browser<F>(handler: F) -> FakeBrowser
where
    F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls: Arc<Mutex<Vec<(String, Value)>>> = Arc::new(Mutex::new(Vec::new()));

    let recorded = calls.clone();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();

        while let Some(Ok(msg)) = rx.next().await {
            let Message::Text(text) = msg else { continue };
            let request: Value = serde_json::from_str(&text).unwrap();
            let id = request["id"].clone();
            let method = request["method"].as_str().unwrap_or_default().to_string();
            let params = request.get("params").cloned().unwrap_or(Value::Null);
            let session_id = request.get("sessionId").cloned();
            recorded.lock().push((method.clone(), params.clone()));

            let (response, events) = match handler(&method, &params) {
                Reply::Result(result) => (Some(json!({"id": id, "result": result})), vec![]),
                Reply::Error(code, message) => (
                    Some(json!({"id": id, "error": {"code": code, "message": message}})),
                    vec![],
                ),
                Reply::ResultThenEvents(result, events) => {
                    (Some(json!({"id": id, "result": result})), events)
                }
                Reply::Silent => (None, vec![]),
            };

            if let Some(response) = response {
                if tx.send(Message::Text(response.to_string().into())).await.is_err() {
                    break;
                }
            }
            for (event, params) in events {
                let mut message = json!({"method": event, "params": params});
                if let Some(ref sid) = session_id {
                    message["sessionId"] = sid.clone();
                }
                if tx.send(Message::Text(message.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    });

    FakeBrowser {
        ws_url: format!("ws://{}/devtools/browser/fake", addr),
        calls,
    }
}

/// Handler that answers target setup and acknowledges everything else.
pub(crate) fn default_reply(method: &str, _params: &Value) -> Reply {
    match method {
        "Target.createTarget" => Reply::Result(json!({"targetId": "T1"})),
        "Target.attachToTarget" => Reply::Result(json!({"sessionId": "S1"})),
        "Page.captureScreenshot" => Reply::Result(json!({"data": "/9j/4AAQ"})),
        _ => Reply::Result(json!({})),
    }
}
