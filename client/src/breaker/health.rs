//! Health-probing circuit breaker
//!
//! A background task polls [`Transport::health`] every sampling interval and
//! publishes the resulting snapshot. `current_state` only reads that
//! snapshot, so probe latency never reaches the emission path.

use super::config::HealthPolicy;
use super::{CircuitBreaker, CircuitBreakerState};
use crate::error::{LineageError, Result};
use crate::transport::Transport;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct HealthCheckCircuitBreaker {
    state: Arc<RwLock<CircuitBreakerState>>,
    task: JoinHandle<()>,
}

impl HealthCheckCircuitBreaker {
    /// Start probing `transport` on the current tokio runtime
    ///
    /// # Errors
    /// `LineageError::Config` when called outside a runtime.
    pub fn spawn(transport: Arc<dyn Transport>, policy: HealthPolicy) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            LineageError::Config(format!("health circuit breaker needs a tokio runtime: {e}"))
        })?;

        let state = Arc::new(RwLock::new(CircuitBreakerState::closed()));
        let task = handle.spawn(probe_loop(transport, policy, Arc::clone(&state)));

        Ok(Self { state, task })
    }
}

async fn probe_loop(
    transport: Arc<dyn Transport>,
    policy: HealthPolicy,
    state: Arc<RwLock<CircuitBreakerState>>,
) {
    let period = policy.sampling_interval.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        interval.tick().await;

        if transport.health().await {
            consecutive_failures = 0;
            if state.read().open {
                info!(transport = transport.name(), "Health probe recovered, circuit closed");
                *state.write() = CircuitBreakerState::closed();
            }
            continue;
        }

        consecutive_failures = consecutive_failures.saturating_add(1);
        if consecutive_failures >= policy.failure_threshold && !state.read().open {
            warn!(
                transport = transport.name(),
                failures = consecutive_failures,
                "Health probe failing, circuit opened"
            );
            *state.write() = CircuitBreakerState::open(format!(
                "{} consecutive failed health probes of '{}'",
                consecutive_failures,
                transport.name()
            ));
        }
    }
}

impl CircuitBreaker for HealthCheckCircuitBreaker {
    fn name(&self) -> &'static str {
        "health"
    }

    fn current_state(&self) -> CircuitBreakerState {
        self.state.read().clone()
    }

    fn close(&self) {
        if !self.task.is_finished() {
            debug!("Stopping health probe");
        }
        self.task.abort();
    }
}

impl Drop for HealthCheckCircuitBreaker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
