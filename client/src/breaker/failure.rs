//! Failure-counting circuit breaker
//!
//! ```text
//!            threshold failures
//!   Closed ─────────────────────► Open
//!     ▲                            │ reset_timeout elapsed
//!     │ half_open_successes        ▼
//!     └──────────────────────── HalfOpen ──► Open (any counted failure)
//! ```
//!
//! Time is read from `tokio::time::Instant`, so tests drive transitions with
//! a paused runtime clock.

use super::config::FailurePolicy;
use super::{CircuitBreaker, CircuitBreakerState};
use crate::error::TransportError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Logical breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - traffic flows
    Closed,
    /// Failing fast - no traffic
    Open,
    /// Trial traffic after the reset timeout
    HalfOpen,
}

enum Phase {
    Closed {
        failures: u32,
        window_start: Option<Instant>,
    },
    Open {
        since: Instant,
        reason: Arc<str>,
    },
    HalfOpen {
        successes: u32,
    },
}

impl Phase {
    fn closed() -> Self {
        Phase::Closed {
            failures: 0,
            window_start: None,
        }
    }
}

/// Opens after `failure_threshold` counted failures within one sampling window
pub struct FailureCircuitBreaker {
    policy: FailurePolicy,
    phase: Mutex<Phase>,
}

impl FailureCircuitBreaker {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            phase: Mutex::new(Phase::closed()),
        }
    }

    pub fn policy(&self) -> &FailurePolicy {
        &self.policy
    }

    /// Current logical state, applying any due open → half-open transition
    pub fn state(&self) -> CircuitState {
        let mut phase = self.phase.lock();
        self.maybe_half_open(&mut phase);
        match *phase {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    fn maybe_half_open(&self, phase: &mut Phase) {
        if let Phase::Open { since, .. } = phase {
            if since.elapsed() >= self.policy.reset_timeout {
                debug!("Circuit breaker half-open, letting trial traffic through");
                *phase = Phase::HalfOpen { successes: 0 };
            }
        }
    }

    fn trip(&self, phase: &mut Phase, reason: String) {
        warn!(reason = %reason, "Circuit breaker opened");
        *phase = Phase::Open {
            since: Instant::now(),
            reason: reason.into(),
        };
    }
}

impl CircuitBreaker for FailureCircuitBreaker {
    fn name(&self) -> &'static str {
        "failure"
    }

    fn current_state(&self) -> CircuitBreakerState {
        let mut phase = self.phase.lock();
        self.maybe_half_open(&mut phase);
        match &*phase {
            Phase::Open { reason, .. } => CircuitBreakerState::open(Arc::clone(reason)),
            Phase::HalfOpen { .. } => CircuitBreakerState::closed().with_reason("half-open trial"),
            Phase::Closed { .. } => CircuitBreakerState::closed(),
        }
    }

    fn record_success(&self) {
        let mut phase = self.phase.lock();
        match &mut *phase {
            Phase::Closed {
                failures,
                window_start,
            } => {
                if self.policy.reset_on_success {
                    *failures = 0;
                    *window_start = None;
                }
            }
            Phase::HalfOpen { successes } => {
                *successes += 1;
                if *successes >= self.policy.half_open_successes {
                    info!("Circuit breaker closed");
                    *phase = Phase::closed();
                }
            }
            // Outcome of a call that started before the circuit opened
            Phase::Open { .. } => {}
        }
    }

    fn record_failure(&self, error: &TransportError) {
        if !self.policy.counts(error) {
            return;
        }

        let mut phase = self.phase.lock();
        let now = Instant::now();
        match &mut *phase {
            Phase::Closed {
                failures,
                window_start,
            } => {
                match window_start {
                    Some(start) if now.duration_since(*start) <= self.policy.sampling_window => {}
                    _ => {
                        *failures = 0;
                        *window_start = Some(now);
                    }
                }
                *failures += 1;
                if *failures >= self.policy.failure_threshold {
                    let reason = format!("{} transport failures, last: {}", failures, error);
                    self.trip(&mut phase, reason);
                }
            }
            Phase::HalfOpen { .. } => {
                let reason = format!("half-open trial failed: {}", error);
                self.trip(&mut phase, reason);
            }
            Phase::Open { .. } => {}
        }
    }
}
