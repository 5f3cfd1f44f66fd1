//! Transport system for lineage events
//!
//! A transport delivers one event to a backend (HTTP endpoint, stdout, a
//! fan-out of other transports). The client calls it inline on the caller's
//! task; any buffering or timeouts are the transport's own business.

pub mod composite;
pub mod config;
pub mod console;
pub mod http;
pub mod noop;

use crate::error::{LineageError, Result, TransportError};
use crate::event::LineageEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use composite::CompositeTransport;
pub use config::{CompositeConfig, ConsoleConfig, HttpConfig, TransportConfig};
pub use console::ConsoleTransport;
pub use http::HttpTransport;
pub use noop::NoopTransport;

/// Transport trait - delivers lineage events to a backend
///
/// Implementations must be safe to share between clients and to call from
/// many tasks at once. Failures are reported as [`TransportError`] values,
/// never as panics.
///
/// # Example
///
/// ```ignore
/// struct QueueTransport {
///     sender: tokio::sync::mpsc::Sender<Vec<u8>>,
/// }
///
/// #[async_trait]
/// impl Transport for QueueTransport {
///     fn name(&self) -> &'static str { "queue" }
///
///     async fn emit(&self, event: &LineageEvent) -> Result<(), TransportError> {
///         let bytes = serde_json::to_vec(event)?;
///         self.sender
///             .try_send(bytes)
///             .map_err(|e| TransportError::Connection(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for identification and logging
    fn name(&self) -> &'static str;

    /// Deliver a single event
    async fn emit(&self, event: &LineageEvent) -> std::result::Result<(), TransportError>;

    /// Health check for the backend
    ///
    /// Polled by the health-check circuit breaker on its own schedule.
    async fn health(&self) -> bool {
        true
    }

    /// Release connections and flush anything buffered
    async fn close(&self) -> std::result::Result<(), TransportError> {
        Ok(())
    }
}

/// Build the transport selected by `config`
///
/// # Errors
/// Returns `LineageError::Config` for an incomplete config and
/// `LineageError::Transport` if the transport cannot be constructed.
pub fn from_config(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config {
        TransportConfig::Http(http) => Arc::new(HttpTransport::from_config(http)?),
        TransportConfig::Console(console) => Arc::new(ConsoleTransport::from_config(console)),
        TransportConfig::Noop => Arc::new(NoopTransport::new()),
        TransportConfig::Composite(composite) => {
            let children = composite
                .transports
                .iter()
                .flatten()
                .map(from_config)
                .collect::<Result<Vec<_>>>()?;
            if children.is_empty() {
                return Err(LineageError::Config(
                    "composite transport needs at least one child transport".to_string(),
                ));
            }
            Arc::new(CompositeTransport::new(
                children,
                composite.continue_on_failure.unwrap_or(true),
            ))
        }
    };
    info!(transport = transport.name(), "Transport configured");
    Ok(transport)
}
