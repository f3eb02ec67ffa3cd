//! Unsolicited event dispatch
//!
//! Documents without a `message-id` are push events from the service. They
//! are handed to the registered callback synchronously on the I/O thread, in
//! arrival order. A slow callback stalls all other traffic; a callback that
//! panics is logged and the I/O thread carries on.

use crate::config::EventCallback;
use crate::metrics::ClientMetrics;
use obsws_core::{types::UPDATE_TYPE, Document};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Routes unsolicited events to the application
#[derive(Clone, Default)]
pub struct EventDispatcher {
    callback: Option<EventCallback>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl EventDispatcher {
    /// Create a dispatcher around an optional callback
    pub fn new(callback: Option<EventCallback>) -> Self {
        Self {
            callback,
            metrics: None,
        }
    }

    /// Record received events on `metrics`
    pub fn with_metrics(mut self, metrics: Option<Arc<ClientMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Check if a callback is registered
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Deliver one event
    ///
    /// Returns false if the callback panicked.
    pub fn dispatch(&self, event: Document) -> bool {
        let update_type = event
            .get(UPDATE_TYPE)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(update_type = %update_type, "Event received");
        if let Some(ref m) = self.metrics {
            m.record_event(&update_type);
        }

        let Some(callback) = self.callback.as_ref() else {
            tracing::trace!(update_type = %update_type, "No event callback registered");
            return true;
        };

        match catch_unwind(AssertUnwindSafe(|| callback(event))) {
            Ok(()) => true,
            Err(_) => {
                tracing::error!(update_type = %update_type, "Event callback panicked");
                if let Some(ref m) = self.metrics {
                    m.record_error("event_callback");
                }
                false
            }
        }
    }
}
