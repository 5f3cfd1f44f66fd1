//! Fan-out transport
//!
//! Delivers every event to each child transport in order. With
//! `continue_on_failure` the remaining children still receive the event
//! after one fails and the composite only reports an error if every child
//! failed; without it the first failure stops the fan-out.

use super::Transport;
use crate::error::TransportError;
use crate::event::LineageEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

pub struct CompositeTransport {
    transports: Vec<Arc<dyn Transport>>,
    continue_on_failure: bool,
}

impl CompositeTransport {
    pub fn new(transports: Vec<Arc<dyn Transport>>, continue_on_failure: bool) -> Self {
        Self {
            transports,
            continue_on_failure,
        }
    }
}

#[async_trait]
impl Transport for CompositeTransport {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn emit(&self, event: &LineageEvent) -> Result<(), TransportError> {
        let mut last_error = None;
        let mut delivered = 0usize;

        for transport in &self.transports {
            match transport.emit(event).await {
                Ok(()) => delivered += 1,
                Err(e) if self.continue_on_failure => {
                    warn!(
                        transport = transport.name(),
                        error = %e,
                        "Composite child failed, continuing"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }

    async fn health(&self) -> bool {
        for transport in &self.transports {
            if transport.health().await {
                return true;
            }
        }
        false
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut first_error = None;
        for transport in &self.transports {
            if let Err(e) = transport.close().await {
                warn!(transport = transport.name(), error = %e, "Failed to close transport");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
