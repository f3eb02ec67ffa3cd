//! Outstanding-request tracking
//!
//! Every originated request is registered here under its correlation id
//! until the matching response arrives or the connection gives up.
//!
//! # Request Lifecycle
//!
//! 1. **Tag**: the caller stamps the request with a fresh `message-id`
//! 2. **Register**: a `Call` entry owns a oneshot sender; an `Emit` entry owns nothing
//! 3. **Send**: the I/O thread writes the request to the websocket
//! 4. **Wait**: a `Call` caller blocks on the oneshot receiver
//! 5. **Resolve**: the I/O thread matches the echoed id and removes the entry
//! 6. **Return**: the caller wakes with the response, or with an error on failure
//!
//! The table lock is held only for the map operation itself. Waking a
//! caller happens after the entry has left the map, so no caller ever
//! contends with the I/O thread while blocked.

use obsws_core::{Document, Error, RequestMode, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Completion signal of a blocking `call`
pub type Completion = oneshot::Sender<Result<Document>>;

/// How a pending request is completed
#[derive(Debug)]
pub enum Waiter {
    /// A caller is blocked on the receiving end
    Call(Completion),
    /// Nobody waits; the entry is just removed
    Emit,
}

impl Waiter {
    /// The request mode this waiter stands for
    pub fn mode(&self) -> RequestMode {
        match self {
            Waiter::Call(_) => RequestMode::Call,
            Waiter::Emit => RequestMode::Emit,
        }
    }

    fn complete(self, result: Result<Document>) {
        if let Waiter::Call(tx) = self {
            // The receiver is gone if the caller stopped waiting
            let _ = tx.send(result);
        }
    }
}

/// A request waiting for its response
#[derive(Debug)]
pub struct PendingRequest {
    /// The tagged request as transmitted
    pub payload: Document,
    /// Completion path
    pub waiter: Waiter,
}

/// Table of requests keyed by correlation id
#[derive(Debug, Clone, Default)]
pub struct RequestTable {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
}

impl RequestTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        // Entries are inserted and removed whole, a poisoned map is consistent
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a request under `id`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRequest` if `id` is already outstanding; the
    /// existing entry is left untouched.
    pub fn register(&self, id: impl Into<String>, payload: Document, waiter: Waiter) -> Result<()> {
        let id = id.into();
        let mut pending = self.lock();
        if pending.contains_key(&id) {
            return Err(Error::InvalidRequest(format!("duplicate correlation id {}", id)));
        }
        pending.insert(id, PendingRequest { payload, waiter });
        Ok(())
    }

    /// Complete the request `id` with `response`
    ///
    /// Returns false, and does nothing, if no such request is outstanding.
    pub fn resolve(&self, id: &str, response: Document) -> bool {
        let entry = self.lock().remove(id);
        match entry {
            Some(request) => {
                request.waiter.complete(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Fail the request `id`; returns false if it was not outstanding
    pub fn fail(&self, id: &str, error: Error) -> bool {
        let entry = self.lock().remove(id);
        match entry {
            Some(request) => {
                request.waiter.complete(Err(error));
                true
            }
            None => false,
        }
    }

    /// Drop the request `id` without completing it
    pub fn remove(&self, id: &str) -> Option<PendingRequest> {
        self.lock().remove(id)
    }

    /// Fail every `Call` with `error` and drop every `Emit`
    ///
    /// Returns the number of callers woken.
    pub fn fail_all(&self, error: Error) -> usize {
        let drained: Vec<PendingRequest> = self.lock().drain().map(|(_, request)| request).collect();
        let mut woken = 0;
        for request in drained {
            if request.waiter.mode() == RequestMode::Call {
                woken += 1;
            }
            request.waiter.complete(Err(error.clone()));
        }
        woken
    }

    /// Number of outstanding requests
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no request is outstanding
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Check whether `id` is outstanding
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }
}
