//! Core document types, codec and framing for obsws
//!
//! This crate holds the transport-agnostic half of the OBS websocket client:
//!
//! - **Types**: wire field names and the response/event classification
//! - **Codec**: correlation-id tagging, request building, status mapping
//! - **Framing**: reassembly of JSON documents split across transport frames
//! - **Error handling**: the client's error taxonomy
//! - **Observability**: tracing subscriber and OpenTelemetry bootstrap
//!
//! The `obsws-client` crate builds the websocket transport, the connection
//! state machine and the blocking `call`/`emit` surface on top of it.
//!
//! # Example
//!
//! ```rust
//! use obsws_core::{codec, FrameReassembler};
//!
//! let mut reassembler = FrameReassembler::new();
//! assert!(reassembler.push(br#"{"message-id":"abc","#).is_empty());
//! let docs = reassembler.push(br#""status":"ok"}"#);
//!
//! let doc = docs.into_iter().next().unwrap().unwrap();
//! assert!(codec::classify(doc).is_response());
//! ```

pub mod codec;
pub mod error;
pub mod framing;
pub mod observability;
pub mod types;

pub use error::{Error, Result};
pub use framing::FrameReassembler;
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{Document, InboundMessage, RequestMode};
