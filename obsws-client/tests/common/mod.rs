//! Common test utilities for obsws-client integration tests
//!
//! The client under test is blocking, so the mock service owns its own
//! multi-threaded tokio runtime and the tests themselves are plain `#[test]`
//! functions.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use obsws_client::ClientBuilder;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Frames the mock service sends back for one received request
pub type Handler = Arc<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

#[derive(Debug, Clone)]
enum Action {
    Push(String),
    Disconnect,
}

/// Mock OBS websocket service for client testing
pub struct MockObsServer {
    runtime: Option<Runtime>,
    addr: SocketAddr,
    received: std_mpsc::Receiver<Value>,
    actions: broadcast::Sender<Action>,
    connections: Arc<AtomicUsize>,
    accepted: Arc<AtomicUsize>,
}

impl MockObsServer {
    /// Start a service that answers every request with `status: ok`
    pub fn echo() -> Self {
        Self::with_handler(|request| vec![ok_response(request, json!({})).to_string()])
    }

    /// Start a service that never answers
    pub fn silent() -> Self {
        Self::with_handler(|_| Vec::new())
    }

    /// Start a service with a custom request handler
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> Vec<String> + Send + Sync + 'static,
    {
        Self::start(Arc::new(handler), true)
    }

    /// Start a service that completes the handshake and then never reads,
    /// so pings go unanswered
    pub fn unresponsive() -> Self {
        Self::start(Arc::new(|_| Vec::new()), false)
    }

    fn start(handler: Handler, reads: bool) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = std_mpsc::channel();
        let (actions, _) = broadcast::channel(64);
        let connections = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));

        {
            let actions = actions.clone();
            let connections = Arc::clone(&connections);
            let accepted = Arc::clone(&accepted);
            runtime.spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let handler = Arc::clone(&handler);
                    let received_tx = received_tx.clone();
                    let action_rx = actions.subscribe();
                    let connections = Arc::clone(&connections);
                    accepted.fetch_add(1, Ordering::SeqCst);

                    tokio::spawn(async move {
                        let Ok(ws) = accept_async(stream).await else {
                            return;
                        };
                        connections.fetch_add(1, Ordering::SeqCst);
                        if reads {
                            serve_connection(ws, handler, received_tx, action_rx).await;
                        } else {
                            hold_connection(ws, action_rx).await;
                        }
                        connections.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            });
        }

        Self {
            runtime: Some(runtime),
            addr,
            received,
            actions,
            connections,
            accepted,
        }
    }

    /// Port the service listens on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Builder pointed at this service, tuned for fast tests
    pub fn client_builder(&self) -> ClientBuilder {
        ClientBuilder::new()
            .address("127.0.0.1")
            .port(self.port())
            .tick(Duration::from_millis(10))
            .retry_table_ms(&[20, 40, 60, 80])
            .jitter_percent(0)
    }

    /// Next request document received, in arrival order
    pub fn next_request(&self, timeout: Duration) -> Option<Value> {
        self.received.recv_timeout(timeout).ok()
    }

    /// Send a raw text frame to every open connection
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.actions.send(Action::Push(frame.into()));
    }

    /// Close every open connection; the listener keeps accepting
    pub fn disconnect_all(&self) {
        let _ = self.actions.send(Action::Disconnect);
    }

    /// Number of open websocket connections
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop the service entirely; the port stops accepting
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_secs(1));
        }
    }
}

impl Drop for MockObsServer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn serve_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    handler: Handler,
    received_tx: std_mpsc::Sender<Value>,
    mut actions: broadcast::Receiver<Action>,
) {
    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Ok(request) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    let _ = received_tx.send(request.clone());
                    for frame in handler(&request) {
                        if write.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => {}
            },
            action = actions.recv() => match action {
                Ok(Action::Push(frame)) => {
                    if write.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
                Ok(Action::Disconnect) => {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}

async fn hold_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    mut actions: broadcast::Receiver<Action>,
) {
    loop {
        match actions.recv().await {
            Ok(Action::Disconnect) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(Action::Push(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
        }
    }
    drop(ws);
}

/// `{"message-id": <echoed>, "status": "ok", ...fields}`
pub fn ok_response(request: &Value, fields: Value) -> Value {
    let mut response = json!({
        "message-id": request["message-id"].clone(),
        "status": "ok",
    });
    if let (Some(map), Some(extra)) = (response.as_object_mut(), fields.as_object()) {
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }
    response
}

/// `{"message-id": <echoed>, "status": "error", "error": message}`
pub fn error_response(request: &Value, message: &str) -> Value {
    json!({
        "message-id": request["message-id"].clone(),
        "status": "error",
        "error": message,
    })
}

/// `{"update-type": update_type, ...fields}`
pub fn event(update_type: &str, fields: Value) -> Value {
    let mut doc = json!({ "update-type": update_type });
    if let (Some(map), Some(extra)) = (doc.as_object_mut(), fields.as_object()) {
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }
    doc
}

/// Poll `pred` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, pred: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    pred()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let request = json!({"request-type": "GetVersion", "message-id": "m1"});

        let ok = ok_response(&request, json!({"version": 1.1}));
        assert_eq!(ok["message-id"], "m1");
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["version"], 1.1);

        let err = error_response(&request, "nope");
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "nope");

        let ev = event("SwitchScenes", json!({"scene-name": "A"}));
        assert_eq!(ev["update-type"], "SwitchScenes");
        assert!(ev.get("message-id").is_none());
    }
}
