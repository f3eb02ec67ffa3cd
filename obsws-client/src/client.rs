//! Blocking client façade
//!
//! [`ObsClient`] gives application threads plain blocking `call` and
//! fire-and-forget `emit` operations on top of the asynchronous websocket
//! session running on the client's I/O thread.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: spawn the I/O thread (connecting right away unless lazy)
//! 2. **Use**: `call`/`emit` from any number of threads
//! 3. **Reconnect**: dropped connections are retried per the retry table
//! 4. **Terminate**: `terminate()`, or drop the last handle
//!
//! # Cloning
//!
//! `ObsClient` is cheaply cloneable using `Arc` internally. All clones share
//! the same connection; the client terminates when the last clone is dropped.
//!
//! # Blocking
//!
//! `call` and `emit` block the calling thread. From async code run them
//! through `tokio::task::spawn_blocking`. They refuse to run on the I/O
//! thread itself, which is where the event callback executes.

use crate::client_builder::ClientBuilder;
use crate::config::ClientConfig;
use crate::connection_state::{ConnectionState, ConnectionStateMachine};
use crate::metrics::ClientMetrics;
use crate::request::{RequestTable, Waiter};
use crate::session::{Command, Session};
use obsws_core::{codec, types::REQUEST_TYPE, Document, Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Blocking call/emit client for the OBS websocket protocol
#[derive(Clone)]
pub struct ObsClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    url: String,
    state: Arc<ConnectionStateMachine>,
    requests: RequestTable,
    commands: mpsc::UnboundedSender<Command>,
    io_thread: Mutex<Option<JoinHandle<Result<()>>>>,
    io_thread_id: ThreadId,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ObsClient {
    /// Start a client with `config`
    ///
    /// Spawns the I/O thread. Unless `config.eager_connect` is false the
    /// first connection attempt starts immediately.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` for an unusable configuration and
    /// `Error::Io` if the I/O thread cannot be spawned.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_metrics(config, None)
    }

    /// Create a builder with default settings
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn with_metrics(config: ClientConfig, metrics: Option<Arc<ClientMetrics>>) -> Result<Self> {
        config.validate()?;
        let url = config.url();
        let state = Arc::new(ConnectionStateMachine::new());
        let requests = RequestTable::new();
        let (commands, receiver) = mpsc::unbounded_channel();

        if let Some(ref m) = metrics {
            m.update_connection_state(ConnectionState::Idle);
        }

        let session = Session::new(config, Arc::clone(&state), requests.clone(), receiver, metrics.clone());
        let thread_state = Arc::clone(&state);
        let thread_requests = requests.clone();
        let io_thread = std::thread::Builder::new()
            .name("obsws-io".to_string())
            .spawn(move || match catch_unwind(AssertUnwindSafe(|| session.run())) {
                Ok(result) => result,
                Err(panic) => {
                    thread_state.terminate();
                    thread_requests.fail_all(Error::Internal("I/O thread panicked".to_string()));
                    resume_unwind(panic)
                }
            })?;

        let io_thread_id = io_thread.thread().id();
        tracing::info!(url = %url, "Client started");

        Ok(Self {
            inner: Arc::new(ClientInner {
                url,
                state,
                requests,
                commands,
                io_thread: Mutex::new(Some(io_thread)),
                io_thread_id,
                metrics,
            }),
        })
    }

    /// Websocket URL this client talks to
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Get the current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.state()
    }

    /// Check if requests can flow right now
    pub fn is_running(&self) -> bool {
        self.connection_state() == ConnectionState::Running
    }

    /// Number of requests registered and not yet resolved
    pub fn pending_requests(&self) -> usize {
        self.inner.requests.len()
    }

    /// Block until the client is running or `timeout` elapses
    ///
    /// Unlike `call`, this never starts a connection attempt.
    pub fn wait_until_running(&self, timeout: Duration) -> bool {
        self.inner
            .state
            .wait_for(timeout, |s| matches!(s, ConnectionState::Running | ConnectionState::Terminated))
            && self.is_running()
    }

    /// Send `request` and block until its response arrives
    ///
    /// The request is copied and tagged with a fresh `message-id`; the
    /// returned document echoes that id.
    ///
    /// # Errors
    ///
    /// - `Error::TransportUnavailable` if the client could not reach the
    ///   running state; nothing was sent
    /// - `Error::RequestFailed` if the connection dropped, retries ran out
    ///   or the client terminated before the response arrived
    /// - `Error::InvalidRequest` if `request` is not a JSON object
    /// - `Error::Internal` when invoked on the I/O thread (from the event callback)
    pub fn call(&self, request: &Document) -> Result<Document> {
        let start = Instant::now();
        let result = self.call_inner(request);
        self.record(request, "call", start, &result);
        result
    }

    fn call_inner(&self, request: &Document) -> Result<Document> {
        self.reject_io_thread()?;
        let id = Uuid::new_v4().to_string();
        let tagged = codec::tag_request(request, &id)?;
        let text = codec::encode(&tagged)?;

        if !self.ensure_running() {
            return Err(Error::TransportUnavailable);
        }

        let (tx, rx) = oneshot::channel();
        self.inner.requests.register(id.clone(), tagged, Waiter::Call(tx))?;
        if self.transmit(&id, text, None).is_err() {
            return Err(Error::TransportUnavailable);
        }

        tracing::trace!(message_id = %id, "Request sent, waiting for response");
        rx.blocking_recv()
            .unwrap_or_else(|_| Err(Error::RequestFailed("request dropped".to_string())))
    }

    /// Send `request` without waiting for its response
    ///
    /// Blocks only until the I/O thread has written the request. Returns
    /// false if it could not be transmitted.
    pub fn emit(&self, request: &Document) -> bool {
        match self.try_emit(request) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Emit failed");
                false
            }
        }
    }

    /// Like [`emit`](Self::emit) but reports why transmission failed
    pub fn try_emit(&self, request: &Document) -> Result<()> {
        let start = Instant::now();
        let result = self.emit_inner(request);
        self.record(request, "emit", start, &result);
        if result.is_ok() {
            if let Some(ref m) = self.inner.metrics {
                m.record_emit(request_type_of(request));
            }
        }
        result
    }

    fn emit_inner(&self, request: &Document) -> Result<()> {
        self.reject_io_thread()?;
        let id = Uuid::new_v4().to_string();
        let tagged = codec::tag_request(request, &id)?;
        let text = codec::encode(&tagged)?;

        if !self.ensure_running() {
            return Err(Error::TransportUnavailable);
        }

        self.inner.requests.register(id.clone(), tagged, Waiter::Emit)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        self.transmit(&id, text, Some(ack_tx))?;

        match ack_rx.blocking_recv() {
            Ok(true) => Ok(()),
            // The I/O thread already dropped the entry
            Ok(false) => Err(Error::RequestFailed("request not transmitted".to_string())),
            Err(_) => {
                self.inner.requests.remove(&id);
                Err(Error::TransportUnavailable)
            }
        }
    }

    /// Call `request_type` with `fields` and check the response status
    ///
    /// # Errors
    ///
    /// Everything `call` returns, plus `Error::Remote` when the service
    /// answers with `"status": "error"`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use obsws_client::ObsClient;
    /// use serde_json::json;
    ///
    /// let client = ObsClient::builder().build()?;
    /// client.request("SetCurrentScene", json!({"scene-name": "Intro"}))?;
    /// # Ok::<(), obsws_core::Error>(())
    /// ```
    pub fn request<P: Serialize>(&self, request_type: &str, fields: P) -> Result<Document> {
        let request = codec::build_request(request_type, fields)?;
        let response = self.call(&request)?;
        codec::check_status(&response)?;
        Ok(response)
    }

    /// Like [`request`](Self::request) but deserializes the response
    pub fn request_typed<P, R>(&self, request_type: &str, fields: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let response = self.request(request_type, fields)?;
        serde_json::from_value(response).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Stop the client and wake every blocked caller
    ///
    /// Idempotent. Outstanding calls fail with `Error::RequestFailed`, and
    /// later calls fail with `Error::TransportUnavailable`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the I/O thread panicked, or the error
    /// that stopped it.
    pub fn terminate(&self) -> Result<()> {
        self.inner.terminate()
    }

    /// Wait until the state is `running`, starting a connection if idle
    ///
    /// Each invocation starts at most one connection attempt, so a caller
    /// that sees the client fall back to idle after its own attempt gives up
    /// instead of retrying forever.
    fn ensure_running(&self) -> bool {
        let mut connect_sent = false;
        loop {
            let (state, epoch) = self.inner.state.snapshot();
            match state {
                ConnectionState::Running => return true,
                ConnectionState::Terminated => return false,
                ConnectionState::Idle => {
                    if connect_sent || self.inner.commands.send(Command::Connect).is_err() {
                        return false;
                    }
                    connect_sent = true;
                }
                ConnectionState::Connecting | ConnectionState::Connected => {}
            }
            self.inner.state.wait_epoch(epoch);
        }
    }

    // The I/O thread would wait on itself
    fn reject_io_thread(&self) -> Result<()> {
        if std::thread::current().id() == self.inner.io_thread_id {
            return Err(Error::Internal(
                "blocking request issued from the I/O thread".to_string(),
            ));
        }
        Ok(())
    }

    fn transmit(&self, id: &str, text: String, ack: Option<oneshot::Sender<bool>>) -> Result<()> {
        let command = Command::Transmit {
            id: id.to_string(),
            text,
            ack,
        };
        if self.inner.commands.send(command).is_err() {
            self.inner.requests.remove(id);
            return Err(Error::TransportUnavailable);
        }
        Ok(())
    }

    fn record<T>(&self, request: &Document, mode: &str, start: Instant, result: &Result<T>) {
        let request_type = request_type_of(request);
        match result {
            Ok(_) => tracing::debug!(request_type, mode, "Request completed"),
            Err(e) => tracing::warn!(request_type, mode, error = %e, "Request failed"),
        }
        if let Some(ref m) = self.inner.metrics {
            let status = match result {
                Ok(_) => "ok",
                Err(e) => {
                    m.record_error(e.kind());
                    e.kind()
                }
            };
            m.record_request(request_type, status, start.elapsed().as_secs_f64());
        }
    }
}

impl std::fmt::Debug for ObsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObsClient")
            .field("url", &self.inner.url)
            .field("state", &self.connection_state())
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}

impl ClientInner {
    fn terminate(&self) -> Result<()> {
        if self.state.terminate() {
            tracing::info!(url = %self.url, "Terminating client");
        }
        let _ = self.commands.send(Command::Shutdown);

        let handle = self
            .io_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let outcome = match handle {
            // From the event callback: the thread exits once the callback returns
            Some(_) if self.io_thread_id == std::thread::current().id() => Ok(()),
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(Error::Internal("I/O thread panicked".to_string())),
            },
            None => Ok(()),
        };

        self.requests
            .fail_all(Error::RequestFailed("client terminated".to_string()));
        outcome
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            tracing::error!(error = %e, "Client terminated abnormally");
        }
    }
}

fn request_type_of(request: &Document) -> &str {
    request
        .get(REQUEST_TYPE)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}
