//! Circuit breaker policy
//!
//! ```yaml
//! circuitBreaker:
//!   type: failure
//!   failureThreshold: 5
//!   resetTimeoutMs: 30000
//!   countedErrors: [connection, timeout]
//! ```

use crate::config::merge::{Merge, merge_value};
use crate::error::{TransportError, TransportErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CircuitBreakerConfig {
    /// Always closed
    #[default]
    Noop,
    /// Opens after repeated transport failures
    Failure(FailureBreakerConfig),
    /// Opens while the transport's health probe keeps failing
    Health(HealthBreakerConfig),
}

impl Merge for CircuitBreakerConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        match (self, other) {
            (CircuitBreakerConfig::Failure(a), CircuitBreakerConfig::Failure(b)) => {
                CircuitBreakerConfig::Failure(a.merge_with_non_null(b))
            }
            (CircuitBreakerConfig::Health(a), CircuitBreakerConfig::Health(b)) => {
                CircuitBreakerConfig::Health(a.merge_with_non_null(b))
            }
            (_, other) => other.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBreakerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_window_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub half_open_successes: Option<u32>,
    /// Error kinds that count toward the threshold; all kinds when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counted_errors: Option<Vec<TransportErrorKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_on_success: Option<bool>,
}

impl FailureBreakerConfig {
    /// Resolve unset fields to their defaults
    pub fn policy(&self) -> FailurePolicy {
        let defaults = FailurePolicy::default();
        FailurePolicy {
            failure_threshold: self
                .failure_threshold
                .unwrap_or(defaults.failure_threshold)
                .max(1),
            reset_timeout: self
                .reset_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reset_timeout),
            sampling_window: self
                .sampling_window_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sampling_window),
            half_open_successes: self
                .half_open_successes
                .unwrap_or(defaults.half_open_successes)
                .max(1),
            counted_errors: self.counted_errors.clone(),
            reset_on_success: self.reset_on_success.unwrap_or(defaults.reset_on_success),
        }
    }
}

impl Merge for FailureBreakerConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            failure_threshold: merge_value(&self.failure_threshold, &other.failure_threshold),
            reset_timeout_ms: merge_value(&self.reset_timeout_ms, &other.reset_timeout_ms),
            sampling_window_ms: merge_value(&self.sampling_window_ms, &other.sampling_window_ms),
            half_open_successes: merge_value(&self.half_open_successes, &other.half_open_successes),
            counted_errors: merge_value(&self.counted_errors, &other.counted_errors),
            reset_on_success: merge_value(&self.reset_on_success, &other.reset_on_success),
        }
    }
}

/// Resolved parameters for [`FailureCircuitBreaker`](super::FailureCircuitBreaker)
#[derive(Debug, Clone, PartialEq)]
pub struct FailurePolicy {
    /// Failures within one sampling window that open the circuit
    pub failure_threshold: u32,
    /// Time spent open before trial traffic is let through
    pub reset_timeout: Duration,
    /// Failures older than this no longer count
    pub sampling_window: Duration,
    /// Consecutive half-open successes needed to close
    pub half_open_successes: u32,
    /// None counts every error kind
    pub counted_errors: Option<Vec<TransportErrorKind>>,
    /// Whether a success while closed clears the failure count
    pub reset_on_success: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            sampling_window: Duration::from_secs(60),
            half_open_successes: 1,
            counted_errors: None,
            reset_on_success: true,
        }
    }
}

impl FailurePolicy {
    pub fn counts(&self, error: &TransportError) -> bool {
        match &self.counted_errors {
            Some(kinds) => kinds.contains(&error.kind()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthBreakerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

impl HealthBreakerConfig {
    pub fn policy(&self) -> HealthPolicy {
        let defaults = HealthPolicy::default();
        HealthPolicy {
            sampling_interval: self
                .sampling_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sampling_interval),
            failure_threshold: self
                .failure_threshold
                .unwrap_or(defaults.failure_threshold)
                .max(1),
        }
    }
}

impl Merge for HealthBreakerConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            sampling_interval_ms: merge_value(
                &self.sampling_interval_ms,
                &other.sampling_interval_ms,
            ),
            failure_threshold: merge_value(&self.failure_threshold, &other.failure_threshold),
        }
    }
}

/// Resolved parameters for [`HealthCheckCircuitBreaker`](super::HealthCheckCircuitBreaker)
#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    pub sampling_interval: Duration,
    /// Consecutive failed probes that open the circuit
    pub failure_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(10),
            failure_threshold: 3,
        }
    }
}
