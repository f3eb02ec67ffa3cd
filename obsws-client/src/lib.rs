//! Blocking client for the OBS websocket remote-control protocol
//!
//! This crate gives application threads simple synchronous `call` and
//! fire-and-forget `emit` operations against a JSON-over-websocket control
//! service, while one background I/O thread deals with the asynchronous
//! side: connecting, reconnecting with jittered backoff, reassembling split
//! frames, correlating responses and delivering unsolicited events.
//!
//! # Core Features
//!
//! - **Blocking calls**: each caller waits on its own completion signal
//! - **Correlation**: every request gets a random `message-id`; responses may arrive in any order
//! - **Events**: documents without `message-id` go to a registered callback
//! - **Auto-Reconnection**: table-driven backoff with jitter, bounded attempts
//! - **Keepalive**: ping after silence, hang up after longer silence
//! - **Observability**: `tracing` logs and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use obsws_client::ObsClient;
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ObsClient::builder()
//!         .address("localhost")
//!         .port(4444)
//!         .on_event(|event| println!("Event: {}", event))
//!         .build()?;
//!
//!     let scenes = client.call(&json!({"request-type": "GetSceneList"}))?;
//!     println!("Scenes: {}", scenes);
//!
//!     client.emit(&json!({"request-type": "SetCurrentScene", "scene-name": "Intro"}));
//!     client.terminate()?;
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod config;
mod connection_state;
mod event;
pub mod global;
mod metrics;
mod reconnect;
mod request;
mod session;

pub use client::ObsClient;
pub use client_builder::ClientBuilder;
pub use config::{ClientConfig, EventCallback, LogFlags, TlsPolicy, DEFAULT_ADDRESS, DEFAULT_PORT};
pub use connection_state::{ConnectionState, ConnectionStateMachine};
pub use event::EventDispatcher;
pub use metrics::ClientMetrics;
pub use reconnect::{
    BackoffTable, NoReconnect, ReconnectionStrategy, RetryScheduler, DEFAULT_BACKOFF_MS,
    DEFAULT_JITTER_PERCENT,
};
pub use request::{Completion, PendingRequest, RequestTable, Waiter};
