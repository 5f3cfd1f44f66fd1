//! Lineage emission pipeline
//!
//! ```text
//! emit(event) ──► breaker.current_state()
//!                   │ open   ──► metric circuit_open, drop
//!                   │ closed ──► filter facets ──► transport.emit ──► metric + breaker outcome
//! ```
//!
//! `emit` never returns an error. Delivery runs inline on the caller's task;
//! a transport that must not block the host queues internally.

use crate::breaker::{self, CircuitBreaker, NoOpCircuitBreaker};
use crate::config::OpenLineageConfig;
use crate::error::{LineageError, Result};
use crate::event::LineageEvent;
use crate::metrics::{MetricsReporter, NoopMetrics, Outcome, PrometheusMetrics};
use crate::transport::{self, Transport};
use prometheus::Registry;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fail-open lineage client
///
/// Cheap to share behind an `Arc`; every collaborator is itself shared.
#[derive(Clone)]
pub struct OpenLineageClient {
    transport: Arc<dyn Transport>,
    breaker: Arc<dyn CircuitBreaker>,
    metrics: Arc<dyn MetricsReporter>,
    disabled_facets: Arc<[String]>,
}

impl OpenLineageClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<dyn CircuitBreaker>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        Self {
            transport,
            breaker,
            metrics,
            disabled_facets: Arc::from(Vec::new()),
        }
    }

    /// Start building a client around `transport`
    pub fn builder(transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(transport)
    }

    /// Wire transport, breaker, metrics and facet filter from `config`
    ///
    /// Metrics are registered on `registry`, tagged with the config's
    /// metrics tags.
    ///
    /// # Errors
    /// Any config problem: unusable transport settings, a health breaker
    /// outside a runtime, or metrics already registered on `registry`.
    pub fn from_config<D>(config: &OpenLineageConfig<D>, registry: &Registry) -> Result<Self> {
        let transport = transport::from_config(&config.transport_config())?;
        let breaker = breaker::from_config(&config.circuit_breaker_config(), &transport)?;
        let metrics = PrometheusMetrics::register(registry, &config.metrics_tags())?;

        let client = Self::builder(transport)
            .with_circuit_breaker(breaker)
            .with_metrics(Arc::new(metrics))
            .with_disabled_facets(config.disabled_facets())
            .build();

        info!(
            transport = client.transport.name(),
            breaker = client.breaker.name(),
            disabled_facets = client.disabled_facets.len(),
            "Lineage client ready"
        );
        Ok(client)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn circuit_breaker(&self) -> &Arc<dyn CircuitBreaker> {
        &self.breaker
    }

    pub fn disabled_facets(&self) -> &[String] {
        &self.disabled_facets
    }

    /// Emit a run, job or dataset event
    pub async fn emit(&self, event: impl Into<LineageEvent>) {
        self.emit_event(&event.into()).await;
    }

    /// Emit an event held by reference
    pub async fn emit_event(&self, event: &LineageEvent) {
        let kind = event.kind();

        let state = self.breaker.current_state();
        if state.open {
            debug!(
                event_type = %kind,
                breaker = self.breaker.name(),
                reason = state.reason.as_deref().unwrap_or_default(),
                "Circuit open, lineage event dropped"
            );
            self.metrics.record(kind, Outcome::CircuitOpen, None);
            return;
        }

        let event = self.filter_facets(event);

        let start = Instant::now();
        let result = self.transport.emit(&event).await;
        let latency = start.elapsed();

        match result {
            Ok(()) => {
                debug!(
                    event_type = %kind,
                    transport = self.transport.name(),
                    latency_ms = latency.as_millis() as u64,
                    "Lineage event emitted"
                );
                self.metrics.record(kind, Outcome::Emitted, Some(latency));
                self.breaker.record_success();
            }
            Err(e) => {
                warn!(
                    event_type = %kind,
                    transport = self.transport.name(),
                    error = %e,
                    "Failed to emit lineage event"
                );
                self.metrics.record(kind, Outcome::TransportError, Some(latency));
                self.breaker.record_failure(&e);
            }
        }
    }

    /// Stop the breaker's background work and close the transport
    ///
    /// # Errors
    /// `LineageError::Transport` if the transport fails to tear down.
    pub async fn close(&self) -> Result<()> {
        self.breaker.close();
        self.transport
            .close()
            .await
            .map_err(|source| LineageError::Transport {
                transport: self.transport.name().to_string(),
                source,
            })?;
        info!(transport = self.transport.name(), "Lineage client closed");
        Ok(())
    }

    fn filter_facets<'a>(&self, event: &'a LineageEvent) -> Cow<'a, LineageEvent> {
        if event.has_any_facet(&self.disabled_facets) {
            Cow::Owned(event.without_facets(&self.disabled_facets))
        } else {
            Cow::Borrowed(event)
        }
    }
}

/// Builder for [`OpenLineageClient`]
///
/// Unset collaborators default to a no-op breaker and no-op metrics.
pub struct ClientBuilder {
    transport: Arc<dyn Transport>,
    breaker: Option<Arc<dyn CircuitBreaker>>,
    metrics: Option<Arc<dyn MetricsReporter>>,
    disabled_facets: Vec<String>,
}

impl ClientBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            breaker: None,
            metrics: None,
            disabled_facets: Vec::new(),
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsReporter>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Facet names stripped from events before delivery
    pub fn with_disabled_facets(mut self, facets: Vec<String>) -> Self {
        self.disabled_facets = facets;
        self
    }

    pub fn build(self) -> OpenLineageClient {
        OpenLineageClient {
            transport: self.transport,
            breaker: self
                .breaker
                .unwrap_or_else(|| Arc::new(NoOpCircuitBreaker::new())),
            metrics: self.metrics.unwrap_or_else(|| Arc::new(NoopMetrics)),
            disabled_facets: Arc::from(self.disabled_facets),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::breaker::CircuitBreakerState;
    use crate::error::TransportError;
    use crate::event::{
        Dataset, DatasetEvent, EventKind, Job, JobEvent, Run, RunEvent, RunState,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Transport that counts calls and keeps what it was given
    #[derive(Default)]
    struct RecordingTransport {
        calls: AtomicU32,
        fail: AtomicBool,
        received: Mutex<Vec<LineageEvent>>,
    }

    impl RecordingTransport {
        fn failing() -> Self {
            let transport = Self::default();
            transport.fail.store(true, Ordering::SeqCst);
            transport
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn emit(&self, event: &LineageEvent) -> std::result::Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Connection("backend down".into()));
            }
            self.received.lock().push(event.clone());
            Ok(())
        }
    }

    /// Breaker with a fixed answer that counts outcome reports
    struct FixedBreaker {
        open: bool,
        successes: AtomicU32,
        failures: AtomicU32,
        closed: AtomicBool,
    }

    impl FixedBreaker {
        fn new(open: bool) -> Arc<Self> {
            Arc::new(Self {
                open,
                successes: AtomicU32::new(0),
                failures: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            })
        }
    }

    impl CircuitBreaker for FixedBreaker {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn current_state(&self) -> CircuitBreakerState {
            if self.open {
                CircuitBreakerState::open("fixed open")
            } else {
                CircuitBreakerState::closed()
            }
        }

        fn record_success(&self) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }

        fn record_failure(&self, _error: &TransportError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn run_event() -> RunEvent {
        RunEvent::new(
            RunState::Start,
            Run::generate(),
            Job::new("flink-jobs", "orders-enrichment"),
        )
    }

    fn job_event() -> JobEvent {
        JobEvent::new(Job::new("flink-jobs", "orders-enrichment"))
    }

    fn dataset_event() -> DatasetEvent {
        DatasetEvent::new(Dataset::new("kafka://broker:9092", "orders"))
    }

    fn events() -> Vec<LineageEvent> {
        vec![run_event().into(), job_event().into(), dataset_event().into()]
    }

    fn client_with(
        transport: &Arc<RecordingTransport>,
        breaker: Arc<dyn CircuitBreaker>,
        registry: &Registry,
    ) -> (OpenLineageClient, Arc<PrometheusMetrics>) {
        let metrics = Arc::new(PrometheusMetrics::register(registry, &Default::default()).unwrap());
        let client = OpenLineageClient::new(transport.clone(), breaker, metrics.clone());
        (client, metrics)
    }

    #[tokio::test]
    async fn test_open_breaker_skips_transport_for_every_variant() {
        for event in events() {
            let transport = Arc::new(RecordingTransport::default());
            let registry = Registry::new();
            let (client, metrics) = client_with(&transport, FixedBreaker::new(true), &registry);

            client.emit_event(&event).await;

            assert_eq!(transport.calls(), 0);
            assert_eq!(metrics.count(event.kind(), Outcome::CircuitOpen), 1);
            assert_eq!(metrics.total(), 1);
        }
    }

    #[tokio::test]
    async fn test_closed_breaker_calls_transport_once_for_every_variant() {
        for event in events() {
            let transport = Arc::new(RecordingTransport::default());
            let breaker = FixedBreaker::new(false);
            let registry = Registry::new();
            let (client, metrics) = client_with(&transport, breaker.clone(), &registry);

            client.emit_event(&event).await;

            assert_eq!(transport.calls(), 1);
            assert_eq!(metrics.count(event.kind(), Outcome::Emitted), 1);
            assert_eq!(breaker.successes.load(Ordering::SeqCst), 1);
            assert_eq!(transport.received.lock()[0], event);
        }
    }

    #[tokio::test]
    async fn test_emit_accepts_each_variant_directly() {
        let transport = Arc::new(RecordingTransport::default());
        let client = OpenLineageClient::builder(transport.clone()).build();

        client.emit(run_event()).await;
        client.emit(job_event()).await;
        client.emit(dataset_event()).await;

        let kinds: Vec<_> = transport.received.lock().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::Run, EventKind::Job, EventKind::Dataset]);
    }

    #[tokio::test]
    async fn test_transport_error_is_swallowed_and_recorded() {
        let transport = Arc::new(RecordingTransport::failing());
        let breaker = FixedBreaker::new(false);
        let registry = Registry::new();
        let (client, metrics) = client_with(&transport, breaker.clone(), &registry);

        client.emit(run_event()).await;
        client.emit(dataset_event()).await;

        assert_eq!(transport.calls(), 2);
        assert_eq!(metrics.count(EventKind::Run, Outcome::TransportError), 1);
        assert_eq!(metrics.count(EventKind::Dataset, Outcome::TransportError), 1);
        assert_eq!(metrics.count(EventKind::Run, Outcome::Emitted), 0);
        assert_eq!(breaker.failures.load(Ordering::SeqCst), 2);
        assert_eq!(breaker.successes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_noop_breaker_always_reaches_transport() {
        let transport = Arc::new(RecordingTransport::failing());
        let client = OpenLineageClient::builder(transport.clone()).build();

        for _ in 0..20 {
            client.emit(job_event()).await;
        }
        assert_eq!(transport.calls(), 20);
    }

    #[tokio::test]
    async fn test_disabled_facets_stripped_before_delivery() {
        let transport = Arc::new(RecordingTransport::default());
        let client = OpenLineageClient::builder(transport.clone())
            .with_disabled_facets(vec!["spark_unknown".to_string()])
            .build();

        let event: LineageEvent = RunEvent::new(
            RunState::Complete,
            Run::generate()
                .with_facet("spark_unknown", json!({"inputs": []}))
                .with_facet("processing_engine", json!({"name": "flink"})),
            Job::new("flink-jobs", "orders-enrichment"),
        )
        .into();

        client.emit_event(&event).await;

        let received = transport.received.lock();
        let LineageEvent::Run(sent) = &received[0] else {
            unreachable!("run event expected");
        };
        assert!(!sent.run.facets.contains_key("spark_unknown"));
        assert!(sent.run.facets.contains_key("processing_engine"));

        // Caller's event untouched
        let LineageEvent::Run(original) = &event else {
            unreachable!("run event expected");
        };
        assert!(original.run.facets.contains_key("spark_unknown"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_emits_record_every_outcome() {
        const TASKS: u64 = 16;
        const PER_TASK: u64 = 25;

        let transport = Arc::new(RecordingTransport::default());
        let registry = Registry::new();
        let (client, metrics) = client_with(&transport, FixedBreaker::new(false), &registry);
        let client = Arc::new(client);

        let handles: Vec<_> = (0..TASKS)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    for _ in 0..PER_TASK {
                        if i % 2 == 0 {
                            client.emit(run_event()).await;
                        } else {
                            client.emit(dataset_event()).await;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(metrics.total(), TASKS * PER_TASK);
        assert_eq!(u64::from(transport.calls()), TASKS * PER_TASK);
    }

    #[tokio::test]
    async fn test_from_config_wires_collaborators() {
        let config = OpenLineageConfig::<crate::config::DatasetConfig>::from_yaml_str(
            "transport:\n  type: noop\ncircuitBreaker:\n  type: failure\nmetrics:\n  env: test\n",
        )
        .unwrap();
        let registry = Registry::new();

        let client = OpenLineageClient::from_config(&config, &registry).unwrap();
        assert_eq!(client.transport().name(), "noop");
        assert_eq!(client.circuit_breaker().name(), "failure");
        assert_eq!(
            client.disabled_facets(),
            ["spark_unknown".to_string(), "spark.logicalPlan".to_string()]
        );

        client.emit(job_event()).await;
        let text = crate::metrics::gather(&registry);
        assert!(text.contains("env=\"test\""));
        assert!(text.contains("outcome=\"emitted\""));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_from_config_without_facets_filters_default_facets() {
        let config = OpenLineageConfig::<crate::config::DatasetConfig>::from_yaml_str(
            "transport:\n  type: noop\n",
        )
        .unwrap();
        let client = OpenLineageClient::from_config(&config, &Registry::new()).unwrap();

        let event: LineageEvent = RunEvent::new(
            RunState::Start,
            Run::generate()
                .with_facet("spark_unknown", json!({"inputs": []}))
                .with_facet("spark.logicalPlan", json!({"plan": {}})),
            Job::new("spark", "etl"),
        )
        .into();
        let filtered = client.filter_facets(&event);
        assert!(!filtered.has_any_facet(&[
            "spark_unknown".to_string(),
            "spark.logicalPlan".to_string()
        ]));
    }

    #[tokio::test]
    async fn test_close_closes_breaker() {
        let transport = Arc::new(RecordingTransport::default());
        let breaker = FixedBreaker::new(false);
        let client = OpenLineageClient::builder(transport)
            .with_circuit_breaker(breaker.clone())
            .build();

        client.close().await.unwrap();
        assert!(breaker.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_from_config_twice_on_one_registry_fails() {
        let config = OpenLineageConfig::<crate::config::DatasetConfig>::defaults();
        let registry = Registry::new();

        OpenLineageClient::from_config(&config, &registry).unwrap();
        assert!(matches!(
            OpenLineageClient::from_config(&config, &registry),
            Err(LineageError::Metrics(_))
        ));
    }
}
