//! Document types for the OBS websocket remote-control protocol
//!
//! Every message on the wire is a single JSON object. Requests originated by
//! the client carry a unique `message-id`; the service echoes that field in
//! its response. Messages without `message-id` are unsolicited push events
//! and carry an `update-type` tag instead.
//!
//! ```text
//! client → {"request-type":"GetVersion","message-id":"4f0c…"}
//! server ← {"message-id":"4f0c…","status":"ok","obs-websocket-version":"4.9.1"}
//! server ← {"update-type":"SwitchScenes","scene-name":"Intro"}
//! ```

use serde_json::Value;

/// Correlation-id field set on every originated request
pub const MESSAGE_ID: &str = "message-id";

/// Type tag of unsolicited push events
pub const UPDATE_TYPE: &str = "update-type";

/// Request name field
pub const REQUEST_TYPE: &str = "request-type";

/// Response status field (`"ok"` or `"error"`)
pub const STATUS: &str = "status";

/// Human-readable error text accompanying `"status": "error"`
pub const ERROR: &str = "error";

/// A structured JSON document as exchanged with the service
pub type Document = Value;

/// How a request expects to be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMode {
    /// The caller blocks until the matching response arrives
    Call,
    /// Fire-and-forget; the response is consumed silently
    Emit,
}

impl RequestMode {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Call => "call",
            RequestMode::Emit => "emit",
        }
    }
}

/// A parsed inbound document, classified by the presence of `message-id`
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Answer to an outstanding request
    Response {
        /// Echoed correlation id
        message_id: String,
        /// The complete response document
        document: Document,
    },
    /// Unsolicited push event
    Event(Document),
}

impl InboundMessage {
    /// Check if this is a response to a request
    pub fn is_response(&self) -> bool {
        matches!(self, InboundMessage::Response { .. })
    }

    /// Check if this is an unsolicited event
    pub fn is_event(&self) -> bool {
        matches!(self, InboundMessage::Event(_))
    }

    /// The `update-type` tag of an event, if present
    pub fn update_type(&self) -> Option<&str> {
        match self {
            InboundMessage::Event(doc) => doc.get(UPDATE_TYPE).and_then(Value::as_str),
            InboundMessage::Response { .. } => None,
        }
    }

    /// Borrow the underlying document
    pub fn document(&self) -> &Document {
        match self {
            InboundMessage::Response { document, .. } => document,
            InboundMessage::Event(doc) => doc,
        }
    }
}
