//! Client builder for configuring connection, retry and observability options
//!
//! The `ClientBuilder` provides a fluent API over [`ClientConfig`]. It allows
//! you to:
//! - Point the client at a service (address, port, path, TLS)
//! - Tune the retry table, jitter and keepalive thresholds
//! - Register the unsolicited-event callback
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use obsws_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # fn example() -> obsws_core::Result<()> {
//! let client = ClientBuilder::new()
//!     .address("studio.local")
//!     .port(4444)
//!     .retry_table_ms(&[100, 200, 400])
//!     .on_event(|event| println!("event: {}", event))
//!     .build()?;
//!
//! // With observability
//! let client2 = ClientBuilder::new()
//!     .with_default_observability()
//!     .service_name("stream-deck")
//!     .lazy_connect()
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, LogFlags, TlsPolicy};
use crate::{ClientMetrics, ObsClient};
use obsws_core::{Document, Error, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating an [`ObsClient`]
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a builder with default settings (`ws://localhost:4444/`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Set the service host name or address
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Set the service port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the websocket request path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Select `ws://` or `wss://`
    pub fn tls(mut self, policy: TlsPolicy) -> Self {
        self.config.tls = policy;
        self
    }

    /// Set the retry delays; their count bounds consecutive retries
    pub fn retry_table(mut self, table: Vec<Duration>) -> Self {
        self.config.retry_table = table;
        self
    }

    /// Set the retry delays in milliseconds
    pub fn retry_table_ms(self, table: &[u64]) -> Self {
        self.retry_table(table.iter().copied().map(Duration::from_millis).collect())
    }

    /// Set the ± jitter applied to each retry delay, in percent
    pub fn jitter_percent(mut self, percent: u8) -> Self {
        self.config.jitter_percent = percent;
        self
    }

    /// Send a keepalive ping after this much inbound silence
    pub fn ping_after(mut self, after: Duration) -> Self {
        self.config.ping_after = after;
        self
    }

    /// Drop the connection after this much inbound silence
    pub fn hangup_after(mut self, after: Duration) -> Self {
        self.config.hangup_after = after;
        self
    }

    /// Set the I/O thread's service tick
    pub fn tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// Register the callback receiving unsolicited events
    ///
    /// The callback runs on the I/O thread; it must return quickly and must
    /// not call back into the client.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(Document) + Send + Sync + 'static,
    {
        self.config.event_callback = Some(Arc::new(callback));
        self
    }

    /// Set diagnostic flags
    pub fn log_flags(mut self, flags: LogFlags) -> Self {
        self.config.log_flags = flags;
        self
    }

    /// Defer the first connection attempt to the first request
    pub fn lazy_connect(mut self) -> Self {
        self.config.eager_connect = false;
        self
    }

    /// Whether requests in flight fail as soon as their connection drops
    pub fn fail_pending_on_disconnect(mut self, enabled: bool) -> Self {
        self.config.fail_pending_on_disconnect = enabled;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// The configuration built so far
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Finish without starting a client
    pub fn into_config(self) -> ClientConfig {
        self.config
    }

    /// Start the client
    ///
    /// # Errors
    ///
    /// - `Error::InvalidRequest` if the keepalive thresholds are inverted or the tick is zero
    /// - `Error::Internal` if observability cannot be initialized
    /// - `Error::Io` if the I/O thread cannot be spawned
    pub fn build(self) -> Result<ObsClient> {
        self.config.validate()?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            obsws_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else {
            None
        };

        ObsClient::with_metrics(self.config, metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new();

        assert_eq!(builder.config().url(), "ws://localhost:4444/");
        assert!(builder.config().eager_connect);
        assert!(builder.config().event_callback.is_none());
        assert!(builder.observability_config.is_none());
        assert!(builder.service_name.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientBuilder::new()
            .address("10.1.1.5")
            .port(4455)
            .path("/ws")
            .tls(TlsPolicy::Enabled)
            .retry_table_ms(&[100, 200])
            .jitter_percent(5)
            .ping_after(Duration::from_secs(1))
            .hangup_after(Duration::from_secs(2))
            .tick(Duration::from_millis(20))
            .on_event(|_| {})
            .log_flags(LogFlags::parse("events"))
            .lazy_connect()
            .fail_pending_on_disconnect(false)
            .into_config();

        assert_eq!(config.url(), "wss://10.1.1.5:4455/ws");
        assert_eq!(config.retry_table, vec![Duration::from_millis(100), Duration::from_millis(200)]);
        assert_eq!(config.jitter_percent, 5);
        assert_eq!(config.tick, Duration::from_millis(20));
        assert!(config.event_callback.is_some());
        assert!(config.log_flags.events);
        assert!(!config.eager_connect);
        assert!(!config.fail_pending_on_disconnect);
    }

    #[test]
    fn test_builder_observability_config() {
        let config = ObservabilityConfig::new("test-client")
            .with_endpoint("http://localhost:4317")
            .with_log_level("debug");

        let builder = ClientBuilder::new()
            .with_observability(config)
            .service_name("renamed");

        let obs_config = builder.observability_config.as_ref().unwrap();
        assert_eq!(obs_config.service_name, "test-client");
        assert_eq!(obs_config.log_level, "debug");
        assert_eq!(builder.service_name.as_deref(), Some("renamed"));
    }

    #[test]
    fn test_builder_default_observability() {
        let builder = ClientBuilder::new().with_default_observability();
        assert_eq!(builder.observability_config.unwrap().service_name, "obsws");
    }

    #[test]
    fn test_from_config() {
        let base = ClientConfig {
            port: 4000,
            ..Default::default()
        };
        let builder = ClientBuilder::from_config(base).address("obs");
        assert_eq!(builder.config().url(), "ws://obs:4000/");
    }

    #[test]
    fn test_build_rejects_inverted_keepalive() {
        let result = ClientBuilder::new()
            .lazy_connect()
            .ping_after(Duration::from_secs(5))
            .hangup_after(Duration::from_secs(1))
            .build();
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_build_rejects_zero_tick() {
        let result = ClientBuilder::new().lazy_connect().tick(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}
