//! Console transport for debugging
//!
//! Writes each event to stdout as one JSON line, or pretty-printed.
//! Useful for development and for checking what an integration produces.

use super::Transport;
use super::config::ConsoleConfig;
use crate::error::TransportError;
use crate::event::LineageEvent;
use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Console transport - prints events for debugging
pub struct ConsoleTransport {
    /// Pretty print events as JSON
    pretty: bool,
    /// Count of events emitted
    emitted_count: AtomicU64,
}

impl ConsoleTransport {
    /// Create a new ConsoleTransport writing one compact line per event
    pub fn new() -> Self {
        Self {
            pretty: false,
            emitted_count: AtomicU64::new(0),
        }
    }

    /// Create a new ConsoleTransport with pretty printing
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            emitted_count: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Self {
        if config.pretty.unwrap_or(false) {
            Self::pretty()
        } else {
            Self::new()
        }
    }

    /// Get total events emitted
    pub fn emitted_count(&self) -> u64 {
        self.emitted_count.load(Ordering::Relaxed)
    }

    fn render(&self, event: &LineageEvent) -> Result<String, TransportError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(event)?
        } else {
            serde_json::to_string(event)?
        };
        Ok(rendered)
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn emit(&self, event: &LineageEvent) -> Result<(), TransportError> {
        let line = self.render(event)?;

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").map_err(|e| TransportError::Connection(e.to_string()))?;

        self.emitted_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        std::io::stdout()
            .flush()
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
