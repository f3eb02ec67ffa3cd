//! Error types for obsws
//!
//! The client distinguishes four failure classes that callers can act on:
//!
//! - **ConnectFailed**: a connection attempt could not be established. Retried
//!   automatically; once the retry table is exhausted every outstanding call
//!   is resolved as [`Error::RequestFailed`].
//! - **ProtocolError**: an inbound frame could not be parsed. Logged and
//!   dropped, the connection stays up.
//! - **RequestFailed**: the link went away before a pending call was answered.
//! - **TransportUnavailable**: the client never reached a usable state, so the
//!   request was not registered or sent at all.
//!
//! The remaining variants cover serialization, websocket and I/O plumbing, and
//! remote-side errors reported inside an otherwise well-formed response.
//!
//! # Examples
//!
//! ```rust
//! use obsws_core::Error;
//!
//! let error = Error::RequestFailed("connection closed".into());
//! assert!(error.is_request_failure());
//! ```

use thiserror::Error;

/// Result type for obsws operations
pub type Result<T> = std::result::Result<T, Error>;

/// Application-level error type for obsws operations
///
/// The enum is `Clone` because a single transport failure is fanned out to
/// every caller blocked on the outstanding-request table.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A connection attempt failed
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// An inbound frame was not a valid JSON document
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The connection dropped before a pending call completed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The client never reached the running state
    #[error("Transport unavailable")]
    TransportUnavailable,

    /// The remote service answered with `"status": "error"`
    #[error("Remote error: {0}")]
    Remote(String),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output error
    #[error("IO error: {0}")]
    Io(String),

    /// The request document cannot be sent as given
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures that resolve an already registered call
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Error::RequestFailed(_))
    }

    /// True when the request never left the client
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::TransportUnavailable)
    }

    /// Short stable label, used as a metrics attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::ConnectFailed(_) => "connect_failed",
            Error::ProtocolError(_) => "protocol",
            Error::RequestFailed(_) => "request_failed",
            Error::TransportUnavailable => "transport_unavailable",
            Error::Remote(_) => "remote",
            Error::Serialization(_) => "serialization",
            Error::WebSocket(_) => "websocket",
            Error::Io(_) => "io",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
