//! OpenLineage client - fail-open lineage event emission
//!
//! Data pipelines describe their runs, jobs and datasets as lineage events and
//! hand them to an [`OpenLineageClient`], which forwards them to a metadata
//! backend through a pluggable [`Transport`].
//!
//! # Architecture
//!
//! ```text
//! Integration ──► Client ──► CircuitBreaker gate ──► Transport ──► backend
//!                   │
//!                   └──► MetricsReporter (emitted / circuit_open / transport_error)
//! ```
//!
//! Emission never fails the host: an open breaker or a failing transport is
//! visible only through metrics and logs.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod transport;

pub use breaker::{CircuitBreaker, CircuitBreakerState, NoOpCircuitBreaker};
pub use client::{ClientBuilder, OpenLineageClient};
pub use config::{FlinkOpenLineageConfig, OpenLineageConfig};
pub use error::{LineageError, Result, TransportError};
pub use event::{DatasetEvent, JobEvent, LineageEvent, RunEvent};
pub use metrics::{MetricsReporter, Outcome, PrometheusMetrics};
pub use transport::Transport;
