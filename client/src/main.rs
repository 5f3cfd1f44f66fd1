//! openlineage-emit - send lineage events from stdin
//!
//! Reads newline-delimited JSON events (run, job or dataset) from stdin and
//! emits each through a client built from the layered config.
//!
//! ## Usage
//!
//! ```bash
//! # Send to a Marquez instance
//! OPENLINEAGE_URL=http://localhost:5000 openlineage-emit < events.ndjson
//!
//! # Print to stdout with debug logging
//! RUST_LOG=debug openlineage-emit < events.ndjson
//! ```
//!
//! ## Environment Variables
//!
//! - `OPENLINEAGE_CONFIG`: YAML config file (default: `openlineage.yml` if present)
//! - `OPENLINEAGE_URL`, `OPENLINEAGE_ENDPOINT`, `OPENLINEAGE_API_KEY`: http transport
//! - `OPENLINEAGE_DISABLED`: `true` drops every event
//! - `OPENLINEAGE_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: log filter (default: "info")

use openlineage_client::config::DatasetConfig;
use openlineage_client::{LineageEvent, OpenLineageClient, OpenLineageConfig, metrics};
use prometheus::Registry;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = OpenLineageConfig::<DatasetConfig>::load()?;
    let registry = Registry::new();
    let client = OpenLineageClient::from_config(&config, &registry)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut read = 0u64;
    let mut skipped = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        read += 1;
        match serde_json::from_str::<LineageEvent>(line) {
            Ok(event) => client.emit_event(&event).await,
            Err(e) => {
                skipped += 1;
                warn!(line = read, error = %e, "Skipping malformed lineage event");
            }
        }
    }

    client.close().await?;
    info!(read, skipped, "Input exhausted");
    tracing::debug!(metrics = %metrics::gather(&registry), "Final client metrics");
    Ok(())
}

fn init_tracing() {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json =
        std::env::var("OPENLINEAGE_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    // Logs go to stderr, stdout belongs to the console transport
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
