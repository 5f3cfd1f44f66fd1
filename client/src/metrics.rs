//! Prometheus metrics for lineage emission
//!
//! Counters and latency histograms are registered on a registry owned by the
//! host process, so the client shows up next to the host's own metrics.

use crate::error::Result;
use crate::event::EventKind;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::time::Duration;

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Transport accepted the event
    Emitted,
    /// Breaker was open, transport not called
    CircuitOpen,
    /// Transport returned an error
    TransportError,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Emitted, Outcome::CircuitOpen, Outcome::TransportError];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Emitted => "emitted",
            Outcome::CircuitOpen => "circuit_open",
            Outcome::TransportError => "transport_error",
        }
    }
}

/// Sink for emission outcomes
///
/// Recording must never fail or panic; implementations swallow their own
/// errors.
pub trait MetricsReporter: Send + Sync {
    /// Record one event's outcome, with the transport latency when a call was made
    fn record(&self, kind: EventKind, outcome: Outcome, latency: Option<Duration>);
}

/// Reporter that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsReporter for NoopMetrics {
    fn record(&self, _kind: EventKind, _outcome: Outcome, _latency: Option<Duration>) {}
}

/// Prometheus-backed reporter
#[derive(Clone)]
pub struct PrometheusMetrics {
    /// Events by type and outcome
    pub events: CounterVec,

    /// Transport call latency by event type
    pub emit_duration: HistogramVec,
}

impl PrometheusMetrics {
    /// Register the client's metrics on `registry`
    ///
    /// `tags` become constant labels on every series.
    ///
    /// # Errors
    /// `LineageError::Metrics` if a metric with the same name is already
    /// registered or a tag is not a valid label name.
    pub fn register(registry: &Registry, tags: &HashMap<String, String>) -> Result<Self> {
        let events = CounterVec::new(
            Opts::new(
                "openlineage_client_events_total",
                "Lineage events handled by the client",
            )
            .const_labels(tags.clone()),
            &["event_type", "outcome"],
        )?;

        let emit_duration = HistogramVec::new(
            HistogramOpts::new(
                "openlineage_client_emit_duration_seconds",
                "Transport call latency",
            )
            .const_labels(tags.clone())
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["event_type"],
        )?;

        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(emit_duration.clone()))?;

        Ok(Self {
            events,
            emit_duration,
        })
    }

    /// Current count for one series
    pub fn count(&self, kind: EventKind, outcome: Outcome) -> u64 {
        self.events
            .get_metric_with_label_values(&[kind.as_str(), outcome.as_str()])
            .map(|c| c.get() as u64)
            .unwrap_or(0)
    }

    /// Sum over every series
    pub fn total(&self) -> u64 {
        EventKind::ALL
            .iter()
            .flat_map(|kind| Outcome::ALL.iter().map(move |outcome| (*kind, *outcome)))
            .map(|(kind, outcome)| self.count(kind, outcome))
            .sum()
    }
}

impl MetricsReporter for PrometheusMetrics {
    fn record(&self, kind: EventKind, outcome: Outcome, latency: Option<Duration>) {
        if let Ok(counter) = self
            .events
            .get_metric_with_label_values(&[kind.as_str(), outcome.as_str()])
        {
            counter.inc();
        }
        if let Some(latency) = latency {
            if let Ok(histogram) = self
                .emit_duration
                .get_metric_with_label_values(&[kind.as_str()])
            {
                histogram.observe(latency.as_secs_f64());
            }
        }
    }
}

/// Gather all metrics on `registry` and encode as Prometheus text format
pub fn gather(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}
