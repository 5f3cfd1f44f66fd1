//! Circuit breakers gating lineage emission
//!
//! The client asks the breaker for a [`CircuitBreakerState`] snapshot before
//! every send and reports each call's outcome afterwards:
//!
//! - **NoOpCircuitBreaker**: always closed
//! - **FailureCircuitBreaker**: opens after repeated transport failures,
//!   half-opens after a reset timeout
//! - **HealthCheckCircuitBreaker**: polls the transport's health probe on a
//!   background task and opens while it keeps failing
//!
//! `current_state` is on the emission hot path and must stay cheap; anything
//! slow runs on the breaker's own schedule.

mod config;
mod failure;
mod health;

pub use config::{
    CircuitBreakerConfig, FailureBreakerConfig, FailurePolicy, HealthBreakerConfig, HealthPolicy,
};
pub use failure::{CircuitState, FailureCircuitBreaker};
pub use health::HealthCheckCircuitBreaker;

use crate::error::{Result, TransportError};
use crate::transport::Transport;
use std::sync::Arc;
use tracing::info;

/// Point-in-time view of a breaker
///
/// The client decides and logs from the same snapshot, so a concurrent
/// transition cannot make one `emit` call see two different answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub open: bool,
    pub reason: Option<Arc<str>>,
    pub timestamp_millis: i64,
}

impl CircuitBreakerState {
    pub fn new(open: bool) -> Self {
        Self {
            open,
            reason: None,
            timestamp_millis: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn closed() -> Self {
        Self::new(false)
    }

    pub fn open(reason: impl Into<Arc<str>>) -> Self {
        Self::new(true).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Gate consulted by the client before every transport call
///
/// Implementations are shared between tasks and must tolerate concurrent
/// queries and outcome reports.
pub trait CircuitBreaker: Send + Sync {
    /// Breaker name for identification and logging
    fn name(&self) -> &'static str;

    /// Snapshot of whether traffic is currently blocked
    fn current_state(&self) -> CircuitBreakerState;

    /// A transport call made while closed succeeded
    fn record_success(&self) {}

    /// A transport call made while closed failed
    fn record_failure(&self, _error: &TransportError) {}

    /// Stop any background work; called when the client closes
    fn close(&self) {}
}

/// Breaker that never opens
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCircuitBreaker;

impl NoOpCircuitBreaker {
    pub fn new() -> Self {
        Self
    }
}

impl CircuitBreaker for NoOpCircuitBreaker {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn current_state(&self) -> CircuitBreakerState {
        CircuitBreakerState::closed()
    }
}

/// Build the breaker selected by `config`
///
/// The health breaker probes `transport` and needs a running tokio runtime.
///
/// # Errors
/// `LineageError::Config` if a health breaker is requested outside a runtime.
pub fn from_config(
    config: &CircuitBreakerConfig,
    transport: &Arc<dyn Transport>,
) -> Result<Arc<dyn CircuitBreaker>> {
    let breaker: Arc<dyn CircuitBreaker> = match config {
        CircuitBreakerConfig::Noop => Arc::new(NoOpCircuitBreaker::new()),
        CircuitBreakerConfig::Failure(failure) => {
            Arc::new(FailureCircuitBreaker::new(failure.policy()))
        }
        CircuitBreakerConfig::Health(health) => Arc::new(HealthCheckCircuitBreaker::spawn(
            Arc::clone(transport),
            health.policy(),
        )?),
    };
    info!(breaker = breaker.name(), "Circuit breaker configured");
    Ok(breaker)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::NoopTransport;

    #[test]
    fn test_noop_breaker_always_closed() {
        let breaker = NoOpCircuitBreaker::new();
        for _ in 0..10 {
            breaker.record_failure(&TransportError::Connection("down".into()));
            let state = breaker.current_state();
            assert!(!state.open);
            assert!(state.reason.is_none());
        }
    }

    #[test]
    fn test_state_constructors() {
        let open = CircuitBreakerState::open("backend down");
        assert!(open.open);
        assert_eq!(open.reason.as_deref(), Some("backend down"));
        assert!(open.timestamp_millis > 0);
        assert!(!CircuitBreakerState::closed().open);
    }

    #[test]
    fn test_from_config_failure_and_noop() {
        let transport: Arc<dyn Transport> = Arc::new(NoopTransport::new());

        let noop = from_config(&CircuitBreakerConfig::Noop, &transport).unwrap();
        assert_eq!(noop.name(), "noop");

        let failure = from_config(
            &CircuitBreakerConfig::Failure(FailureBreakerConfig::default()),
            &transport,
        )
        .unwrap();
        assert_eq!(failure.name(), "failure");
    }

    #[test]
    fn test_health_breaker_outside_runtime_is_config_error() {
        let transport: Arc<dyn Transport> = Arc::new(NoopTransport::new());
        let result = from_config(
            &CircuitBreakerConfig::Health(HealthBreakerConfig::default()),
            &transport,
        );
        assert!(matches!(
            result,
            Err(crate::error::LineageError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_health_breaker_inside_runtime() {
        let transport: Arc<dyn Transport> = Arc::new(NoopTransport::new());
        let breaker = from_config(
            &CircuitBreakerConfig::Health(HealthBreakerConfig::default()),
            &transport,
        )
        .unwrap();
        assert_eq!(breaker.name(), "health");
        assert!(!breaker.current_state().open);
    }
}
