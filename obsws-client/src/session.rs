//! Transport session: the client's I/O thread
//!
//! One dedicated OS thread owns the websocket. It runs a single-threaded
//! tokio runtime and is the only mutator of the connection state (apart
//! from termination), the reassembly buffer and the retry counter. Callers
//! reach it through an unbounded command channel whose send never blocks.
//!
//! # Service loop
//!
//! ```text
//!          ┌──────────── idle ◄──────────────┐
//!  Connect │                                 │ retries exhausted
//!          ▼                                 │
//!     connecting ──(handshake)──► connected ─┼─(one tick)──► running
//!          ▲   └──(failed)──► retry pause ───┘                  │
//!          └──────────────────(transport lost)──────────────────┘
//! ```
//!
//! Every wait in the loop also listens to a periodic tick of
//! `ClientConfig::tick` so that termination and keepalive deadlines are
//! observed promptly.

use crate::config::ClientConfig;
use crate::connection_state::{ConnectionState, ConnectionStateMachine};
use crate::event::EventDispatcher;
use crate::metrics::ClientMetrics;
use crate::reconnect::{BackoffTable, RetryScheduler};
use crate::request::RequestTable;
use futures::{SinkExt, StreamExt};
use obsws_core::{codec, Document, Error, FrameReassembler, InboundMessage, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Work handed from caller threads to the I/O thread
#[derive(Debug)]
pub(crate) enum Command {
    /// Start a connection attempt if idle
    Connect,
    /// Write a tagged, encoded request
    Transmit {
        /// Correlation id of the registered request
        id: String,
        /// Encoded request
        text: String,
        /// Transmission acknowledgment, for emits
        ack: Option<oneshot::Sender<bool>>,
    },
    /// Close the connection and stop the thread
    Shutdown,
}

enum Flow {
    Continue,
    Stop,
}

enum Opened {
    Stream(Box<WsStream>),
    Failed(Error),
    Stop,
}

enum Served {
    Lost(String),
    Stop,
}

/// State owned by the I/O thread
pub(crate) struct Session {
    config: ClientConfig,
    state: Arc<ConnectionStateMachine>,
    requests: RequestTable,
    events: EventDispatcher,
    commands: mpsc::UnboundedReceiver<Command>,
    scheduler: RetryScheduler,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Session {
    pub(crate) fn new(
        config: ClientConfig,
        state: Arc<ConnectionStateMachine>,
        requests: RequestTable,
        commands: mpsc::UnboundedReceiver<Command>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let strategy = BackoffTable::new(config.retry_table.clone(), config.jitter_percent);
        let events = EventDispatcher::new(config.event_callback.clone()).with_metrics(metrics.clone());
        Self {
            config,
            state,
            requests,
            events,
            commands,
            scheduler: RetryScheduler::new(Box::new(strategy)),
            metrics,
        }
    }

    /// Run the service loop to completion on the current thread
    ///
    /// On return the state is `Terminated` and no request is outstanding,
    /// whether the loop ended normally or the runtime could not be built.
    pub(crate) fn run(mut self) -> Result<()> {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build I/O runtime");
                self.finish();
                return Err(e.into());
            }
        };

        runtime.block_on(self.drive());
        self.finish();
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) -> bool {
        let moved = self.state.transition(next);
        if moved {
            if let Some(ref m) = self.metrics {
                m.update_connection_state(next);
            }
        }
        moved
    }

    fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.config.tick, self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    #[tracing::instrument(name = "obsws_io", skip(self), fields(url = %self.config.url()))]
    async fn drive(&mut self) {
        let mut connect_now = self.config.eager_connect;

        'idle: loop {
            if !connect_now {
                if let Flow::Stop = self.wait_idle().await {
                    break;
                }
            }
            connect_now = false;

            if !self.set_state(ConnectionState::Connecting) {
                break;
            }

            loop {
                match self.open().await {
                    Opened::Stream(ws) => {
                        self.scheduler.reset();
                        if let Some(ref m) = self.metrics {
                            m.record_reconnection_success();
                        }
                        if !self.set_state(ConnectionState::Connected) {
                            break 'idle;
                        }
                        tracing::info!("Connected");

                        match self.serve(*ws).await {
                            Served::Stop => break 'idle,
                            Served::Lost(reason) => {
                                tracing::warn!(reason = %reason, "Connection lost");
                                if self.config.fail_pending_on_disconnect {
                                    let failed = self
                                        .requests
                                        .fail_all(Error::RequestFailed(format!("connection lost: {}", reason)));
                                    if failed > 0 {
                                        tracing::warn!(failed, "Failed requests in flight");
                                    }
                                }
                                if !self.set_state(ConnectionState::Connecting) {
                                    break 'idle;
                                }
                            }
                        }
                    }
                    Opened::Failed(e) => {
                        tracing::warn!(error = %e, attempt = self.scheduler.attempts() + 1, "Connection attempt failed");
                        if let Some(ref m) = self.metrics {
                            m.record_error(e.kind());
                        }
                    }
                    Opened::Stop => break 'idle,
                }

                match self.scheduler.next_delay() {
                    Some(delay) => {
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = self.scheduler.attempts(),
                            "Retrying connection"
                        );
                        if let Some(ref m) = self.metrics {
                            m.record_reconnection_attempt();
                        }
                        if let Flow::Stop = self.pause(delay).await {
                            break 'idle;
                        }
                    }
                    None => {
                        tracing::error!(attempts = self.scheduler.attempts(), "Connection attempts exhausted");
                        if !self.set_state(ConnectionState::Idle) {
                            break 'idle;
                        }
                        let failed = self
                            .requests
                            .fail_all(Error::RequestFailed("connection attempts exhausted".to_string()));
                        if failed > 0 {
                            tracing::warn!(failed, "Failed outstanding requests");
                        }
                        continue 'idle;
                    }
                }
            }
        }
    }

    /// Handle a command while no connection is up
    fn offline_command(&self, command: Option<Command>) -> Flow {
        match command {
            Some(Command::Connect) => Flow::Continue,
            Some(Command::Transmit { id, ack, .. }) => {
                tracing::debug!(message_id = %id, "Dropping request, not connected");
                self.requests
                    .fail(&id, Error::RequestFailed("not connected".to_string()));
                if let Some(ack) = ack {
                    let _ = ack.send(false);
                }
                Flow::Continue
            }
            Some(Command::Shutdown) | None => Flow::Stop,
        }
    }

    async fn wait_idle(&mut self) -> Flow {
        let mut ticker = self.ticker();
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => return Flow::Continue,
                    other => {
                        if let Flow::Stop = self.offline_command(other) {
                            return Flow::Stop;
                        }
                    }
                },
                _ = ticker.tick() => {
                    if self.state.is_terminated() {
                        return Flow::Stop;
                    }
                }
            }
        }
    }

    async fn pause(&mut self, delay: Duration) -> Flow {
        let mut ticker = self.ticker();
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Flow::Continue,
                command = self.commands.recv() => {
                    if let Flow::Stop = self.offline_command(command) {
                        return Flow::Stop;
                    }
                }
                _ = ticker.tick() => {
                    if self.state.is_terminated() {
                        return Flow::Stop;
                    }
                }
            }
        }
    }

    async fn open(&mut self) -> Opened {
        let url = self.config.url();
        tracing::debug!(url = %url, "Opening websocket");

        let mut ticker = self.ticker();
        let connect = connect_async(url.as_str());
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok((ws, _response)) => Opened::Stream(Box::new(ws)),
                        Err(e) => Opened::Failed(Error::ConnectFailed(e.to_string())),
                    };
                }
                command = self.commands.recv() => {
                    if let Flow::Stop = self.offline_command(command) {
                        return Opened::Stop;
                    }
                }
                _ = ticker.tick() => {
                    if self.state.is_terminated() {
                        return Opened::Stop;
                    }
                }
            }
        }
    }

    async fn serve(&mut self, ws: WsStream) -> Served {
        let (mut sink, mut stream) = ws.split();
        // A reconnect always starts from an empty buffer
        let mut reassembler = FrameReassembler::new();
        let mut ticker = self.ticker();
        let mut last_inbound = Instant::now();
        let mut ping_sent = false;

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let chunk = match frame {
                        Some(Ok(Message::Text(text))) => text.into_bytes(),
                        Some(Ok(Message::Binary(data))) => data,
                        Some(Ok(Message::Close(frame))) => {
                            return Served::Lost(match frame {
                                Some(f) => format!("closed by peer ({}): {}", u16::from(f.code), f.reason),
                                None => "closed by peer".to_string(),
                            });
                        }
                        Some(Ok(_)) => {
                            last_inbound = Instant::now();
                            ping_sent = false;
                            continue;
                        }
                        Some(Err(e)) => return Served::Lost(self.websocket_error(e).to_string()),
                        None => return Served::Lost("stream ended".to_string()),
                    };

                    last_inbound = Instant::now();
                    ping_sent = false;
                    if self.config.log_flags.events {
                        tracing::info!(frame = %String::from_utf8_lossy(&chunk), "Frame received");
                    } else {
                        tracing::trace!(len = chunk.len(), "Frame received");
                    }

                    for parsed in reassembler.push(&chunk) {
                        match parsed {
                            Ok(doc) => self.dispatch(doc),
                            Err(e) => {
                                tracing::warn!(error = %e, "Discarding malformed input");
                                if let Some(ref m) = self.metrics {
                                    m.record_error(e.kind());
                                }
                            }
                        }
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {}
                    Some(Command::Transmit { id, text, ack }) => {
                        tracing::trace!(message_id = %id, "Sending request");
                        match sink.send(Message::Text(text)).await {
                            Ok(()) => {
                                if let Some(ack) = ack {
                                    let _ = ack.send(true);
                                }
                            }
                            Err(e) => {
                                let error = self.websocket_error(e);
                                self.requests
                                    .fail(&id, Error::RequestFailed(format!("write failed: {}", error)));
                                if let Some(ack) = ack {
                                    let _ = ack.send(false);
                                }
                                return Served::Lost(format!("write failed: {}", error));
                            }
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return Served::Stop;
                    }
                },
                _ = ticker.tick() => {
                    if self.state.is_terminated() {
                        let _ = sink.send(Message::Close(None)).await;
                        return Served::Stop;
                    }
                    if self.state.compare_and_set(ConnectionState::Connected, ConnectionState::Running) {
                        if let Some(ref m) = self.metrics {
                            m.update_connection_state(ConnectionState::Running);
                        }
                        tracing::info!("Running");
                    }

                    let silence = last_inbound.elapsed();
                    if silence >= self.config.hangup_after {
                        return Served::Lost(format!("no traffic for {:?}", silence));
                    }
                    if silence >= self.config.ping_after && !ping_sent {
                        tracing::debug!(silence_ms = silence.as_millis() as u64, "Sending keepalive ping");
                        if let Err(e) = sink.send(Message::Ping(Vec::new())).await {
                            return Served::Lost(format!("ping failed: {}", self.websocket_error(e)));
                        }
                        ping_sent = true;
                    }
                }
            }
        }
    }

    fn websocket_error(&self, e: WsError) -> Error {
        let error = Error::WebSocket(e.to_string());
        if let Some(ref m) = self.metrics {
            m.record_error(error.kind());
        }
        error
    }

    fn dispatch(&self, doc: Document) {
        if !doc.is_object() {
            tracing::warn!(document = %doc, "Discarding non-object document");
            if let Some(ref m) = self.metrics {
                m.record_error("protocol");
            }
            return;
        }

        match codec::classify(doc) {
            InboundMessage::Response { message_id, document } => {
                if self.requests.resolve(&message_id, document) {
                    tracing::trace!(message_id = %message_id, "Request resolved");
                } else {
                    tracing::debug!(message_id = %message_id, "Dropping response for unknown request");
                }
            }
            InboundMessage::Event(event) => {
                self.events.dispatch(event);
            }
        }
    }

    /// Enter the terminal state and release every waiter
    fn finish(&mut self) {
        self.state.terminate();
        if let Some(ref m) = self.metrics {
            m.update_connection_state(ConnectionState::Terminated);
        }

        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Transmit { id, ack, .. } = command {
                self.requests
                    .fail(&id, Error::RequestFailed("client terminated".to_string()));
                if let Some(ack) = ack {
                    let _ = ack.send(false);
                }
            }
        }

        let failed = self
            .requests
            .fail_all(Error::RequestFailed("client terminated".to_string()));
        tracing::info!(failed, "I/O thread stopped");
    }
}
