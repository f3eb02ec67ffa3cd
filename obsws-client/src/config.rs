//! Client configuration
//!
//! [`ClientConfig`] is immutable once a client is built from it. Use
//! [`ClientBuilder`](crate::ClientBuilder) to construct one fluently.

use crate::reconnect::{DEFAULT_BACKOFF_MS, DEFAULT_JITTER_PERCENT};
use obsws_core::{Document, Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback receiving every unsolicited event, on the I/O thread
pub type EventCallback = Arc<dyn Fn(Document) + Send + Sync>;

/// Default service address
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Default service port
pub const DEFAULT_PORT: u16 = 4444;

/// Whether the websocket runs over TLS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Plain `ws://`
    #[default]
    Disabled,
    /// `wss://`; requires the `tls` feature
    Enabled,
}

impl TlsPolicy {
    /// URL scheme for this policy
    pub fn scheme(&self) -> &'static str {
        match self {
            TlsPolicy::Disabled => "ws",
            TlsPolicy::Enabled => "wss",
        }
    }
}

/// Diagnostic flags, as passed to `configure`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogFlags {
    /// Log every received frame at info level
    pub events: bool,
}

impl LogFlags {
    /// Parse a comma or whitespace separated flag list
    ///
    /// Unknown flags are logged and ignored.
    pub fn parse(flags: &str) -> Self {
        let mut parsed = Self::default();
        for flag in flags
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
        {
            match flag.to_ascii_lowercase().as_str() {
                "events" => parsed.events = true,
                other => tracing::warn!(flag = %other, "Ignoring unknown log flag"),
            }
        }
        parsed
    }
}

/// Immutable client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Service host name or address
    pub address: String,
    /// Service port
    pub port: u16,
    /// Request path of the websocket endpoint
    pub path: String,
    /// `ws://` or `wss://`
    pub tls: TlsPolicy,
    /// Delay before each consecutive retry; its length bounds the retries
    pub retry_table: Vec<Duration>,
    /// Uniform ± jitter applied to each retry delay, in percent
    pub jitter_percent: u8,
    /// Inbound silence after which a websocket ping is sent
    pub ping_after: Duration,
    /// Inbound silence after which the connection is considered lost
    pub hangup_after: Duration,
    /// Service-loop tick of the I/O thread
    pub tick: Duration,
    /// Receiver of unsolicited events
    pub event_callback: Option<EventCallback>,
    /// Diagnostic flags
    pub log_flags: LogFlags,
    /// Connect as soon as the client is built instead of on first use
    pub eager_connect: bool,
    /// Fail requests in flight as soon as their connection drops
    pub fail_pending_on_disconnect: bool,
}

impl ClientConfig {
    /// Check the settings a client cannot run with
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` for a zero service tick, a hangup
    /// threshold shorter than the ping threshold, or TLS requested from a
    /// build without the `tls` feature.
    pub fn validate(&self) -> Result<()> {
        #[cfg(not(feature = "tls"))]
        if self.tls == TlsPolicy::Enabled {
            return Err(Error::InvalidRequest(
                "TLS requested but obsws-client was built without the `tls` feature".to_string(),
            ));
        }
        if self.tick.is_zero() {
            return Err(Error::InvalidRequest("service tick must be non-zero".to_string()));
        }
        if self.hangup_after < self.ping_after {
            return Err(Error::InvalidRequest(
                "hangup threshold must not precede the ping threshold".to_string(),
            ));
        }
        Ok(())
    }

    /// Websocket URL of the service
    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", self.tls.scheme(), self.address, self.port, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            path: "/".to_string(),
            tls: TlsPolicy::Disabled,
            retry_table: DEFAULT_BACKOFF_MS.iter().copied().map(Duration::from_millis).collect(),
            jitter_percent: DEFAULT_JITTER_PERCENT,
            ping_after: Duration::from_secs(3),
            hangup_after: Duration::from_secs(10),
            tick: Duration::from_millis(50),
            event_callback: None,
            log_flags: LogFlags::default(),
            eager_connect: true,
            fail_pending_on_disconnect: true,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url())
            .field("retry_table", &self.retry_table)
            .field("jitter_percent", &self.jitter_percent)
            .field("ping_after", &self.ping_after)
            .field("hangup_after", &self.hangup_after)
            .field("tick", &self.tick)
            .field("event_callback", &self.event_callback.is_some())
            .field("log_flags", &self.log_flags)
            .field("eager_connect", &self.eager_connect)
            .field("fail_pending_on_disconnect", &self.fail_pending_on_disconnect)
            .finish()
    }
}
