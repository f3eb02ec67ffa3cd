//! Process-wide default client
//!
//! Small applications often want one connection shared by the whole process.
//! [`configure`] records how to reach the service; the first [`call`] or
//! [`emit`] starts a shared [`ObsClient`] lazily; [`shutdown`] terminates it.
//!
//! ```rust,no_run
//! use serde_json::json;
//!
//! obsws_client::global::configure(|event| println!("{}", event), "localhost", 4444, "events")?;
//! let version = obsws_client::global::call(&json!({"request-type": "GetVersion"}))?;
//! println!("{}", version);
//! obsws_client::global::shutdown()?;
//! # Ok::<(), obsws_core::Error>(())
//! ```

use crate::client::ObsClient;
use crate::config::{ClientConfig, LogFlags};
use obsws_core::{Document, Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};

struct Shared {
    config: Option<ClientConfig>,
    client: Option<ObsClient>,
}

static SHARED: Mutex<Shared> = Mutex::new(Shared {
    config: None,
    client: None,
});

fn shared() -> MutexGuard<'static, Shared> {
    SHARED.lock().unwrap_or_else(|e| e.into_inner())
}

/// Configure the shared client before first use
///
/// `log_flags` is a comma or whitespace separated list; `events` logs every
/// received frame.
///
/// # Errors
///
/// Returns `Error::Internal` if the shared client has already started.
pub fn configure<F>(event_callback: F, address: &str, port: u16, log_flags: &str) -> Result<()>
where
    F: Fn(Document) + Send + Sync + 'static,
{
    configure_with(ClientConfig {
        address: address.to_string(),
        port,
        event_callback: Some(Arc::new(event_callback)),
        log_flags: LogFlags::parse(log_flags),
        ..ClientConfig::default()
    })
}

/// Configure the shared client with a complete configuration
///
/// # Errors
///
/// Returns `Error::Internal` if the shared client has already started.
pub fn configure_with(config: ClientConfig) -> Result<()> {
    let mut shared = shared();
    if shared.client.is_some() {
        return Err(Error::Internal(
            "shared client already started; configure before first use".to_string(),
        ));
    }
    tracing::debug!(config = ?config, "Shared client configured");
    shared.config = Some(config);
    Ok(())
}

/// Get the shared client, starting it on first use
pub fn client() -> Result<ObsClient> {
    let mut shared = shared();
    if let Some(ref client) = shared.client {
        return Ok(client.clone());
    }
    let config = shared.config.clone().unwrap_or_default();
    let client = ObsClient::new(config)?;
    shared.client = Some(client.clone());
    Ok(client)
}

/// Blocking call on the shared client
pub fn call(request: &Document) -> Result<Document> {
    client()?.call(request)
}

/// Fire-and-forget request on the shared client
pub fn emit(request: &Document) -> bool {
    match client() {
        Ok(client) => client.emit(request),
        Err(e) => {
            tracing::warn!(error = %e, "Shared client unavailable");
            false
        }
    }
}

/// Terminate and discard the shared client
///
/// The stored configuration is kept; a later `call` starts a new client.
pub fn shutdown() -> Result<()> {
    let client = shared().client.take();
    match client {
        Some(client) => client.terminate(),
        None => Ok(()),
    }
}

/// Check whether the shared client is currently started
pub fn is_started() -> bool {
    shared().client.is_some()
}
