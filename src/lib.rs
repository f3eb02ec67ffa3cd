//! obsws - blocking OBS websocket client
//!
//! Convenience crate re-exporting the obsws sub-crates, so applications need
//! a single dependency.
//!
//! - **obsws-core**: document types, codec, framing, errors, observability
//! - **obsws-client**: the websocket client with `call`, `emit` and events
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     obsws::configure(|event| println!("{}", event), "localhost", 4444, "")?;
//!
//!     let status = obsws::call(&json!({"request-type": "GetStreamingStatus"}))?;
//!     println!("Streaming: {}", status["streaming"]);
//!
//!     obsws::emit(&json!({"request-type": "StartStopRecording"}));
//!     obsws::shutdown()?;
//!     Ok(())
//! }
//! ```

pub use obsws_client as client;
pub use obsws_core as core;

pub use obsws_client::global::{call, configure, emit, shutdown};
pub use obsws_client::{ClientBuilder, ClientConfig, ConnectionState, ObsClient};
pub use obsws_core::{Document, Error, Result};
