//! Transport that drops every event
//!
//! Selected with `type: noop` or `OPENLINEAGE_DISABLED=true` to switch
//! lineage off without touching the integration.

use super::Transport;
use crate::error::TransportError;
use crate::event::LineageEvent;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct NoopTransport;

impl NoopTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for NoopTransport {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn emit(&self, _event: &LineageEvent) -> Result<(), TransportError> {
        Ok(())
    }
}
