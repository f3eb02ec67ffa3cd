//! Client metrics definitions
//!
//! OpenTelemetry instruments describing client health. They are recorded
//! through the global meter provider, so nothing is exported unless the
//! application enabled metrics in its observability setup.
//!
//! # Metrics Collected
//!
//! - **obsws.client.connection.state**: lifecycle state (gauge, 0=idle … 4=terminated)
//! - **obsws.client.requests.total**: completed requests by request type and status (counter)
//! - **obsws.client.request.duration**: round-trip time in seconds (histogram)
//! - **obsws.client.errors.total**: errors by kind (counter)
//! - **obsws.client.reconnection.attempts**: scheduled retries (counter)
//! - **obsws.client.reconnection.success**: connections established (counter)
//! - **obsws.client.events.received**: unsolicited events by update type (counter)
//! - **obsws.client.emits.total**: fire-and-forget requests handed to the transport (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use obsws_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("stream-deck");
//! metrics.record_event("SwitchScenes");
//! ```

use crate::connection_state::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
#[derive(Debug)]
pub struct ClientMetrics {
    /// Connection state
    pub connection_state: Gauge<i64>,
    /// Completed requests
    pub requests_total: Counter<u64>,
    /// Request round-trip time in seconds
    pub request_duration: Histogram<f64>,
    /// Errors by kind
    pub errors_total: Counter<u64>,
    /// Retries scheduled
    pub reconnection_attempts: Counter<u64>,
    /// Connections established
    pub reconnection_success: Counter<u64>,
    /// Unsolicited events received
    pub events_received: Counter<u64>,
    /// Emits handed to the transport
    pub emits_total: Counter<u64>,
}

impl ClientMetrics {
    /// Create instruments on the global meter named after `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(service_name.into()).build(),
        );
        Self::new_with_meter(&meter)
    }

    /// Create instruments on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("obsws.client.connection.state")
                .with_description("Connection state (0=idle, 1=connecting, 2=connected, 3=running, 4=terminated)")
                .build(),
            requests_total: meter
                .u64_counter("obsws.client.requests.total")
                .with_description("Total number of completed requests")
                .build(),
            request_duration: meter
                .f64_histogram("obsws.client.request.duration")
                .with_description("Request round-trip time in seconds")
                .build(),
            errors_total: meter
                .u64_counter("obsws.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("obsws.client.reconnection.attempts")
                .with_description("Total number of scheduled connection retries")
                .build(),
            reconnection_success: meter
                .u64_counter("obsws.client.reconnection.success")
                .with_description("Total number of established connections")
                .build(),
            events_received: meter
                .u64_counter("obsws.client.events.received")
                .with_description("Total number of unsolicited events received")
                .build(),
            emits_total: meter
                .u64_counter("obsws.client.emits.total")
                .with_description("Total number of fire-and-forget requests sent")
                .build(),
        }
    }

    /// Update connection state
    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_gauge(), &[]);
    }

    /// Record a completed request
    pub fn record_request(&self, request_type: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("request_type", request_type.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error by its kind label
    pub fn record_error(&self, kind: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_type", kind.to_string())]);
    }

    /// Record a scheduled retry
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record an established connection
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    /// Record an unsolicited event
    pub fn record_event(&self, update_type: &str) {
        self.events_received
            .add(1, &[KeyValue::new("update_type", update_type.to_string())]);
    }

    /// Record an emit handed to the transport
    pub fn record_emit(&self, request_type: &str) {
        self.emits_total
            .add(1, &[KeyValue::new("request_type", request_type.to_string())]);
    }
}
