//! HTTP transport
//!
//! POSTs each event as JSON to `url + endpoint`.
//!
//! # Example
//!
//! ```ignore
//! let transport = HttpTransport::new("http://marquez:5000")?
//!     .api_key("secret")
//!     .header("X-Tenant", "analytics");
//! ```

use super::Transport;
use super::config::HttpConfig;
use crate::error::{LineageError, TransportError};
use crate::event::LineageEvent;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Path appended to the base URL when the config names none
pub const DEFAULT_ENDPOINT: &str = "/api/v1/lineage";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 2;

/// HTTP transport - POSTs events as JSON
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpTransport {
    /// Create a new HttpTransport posting to `base_url` + [`DEFAULT_ENDPOINT`]
    ///
    /// Uses default timeouts: 5s request timeout, 2s connection timeout.
    ///
    /// # Errors
    /// Returns `TransportError::Init` if the HTTP client cannot be created
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, TransportError> {
        Self::build(
            base_url.as_ref(),
            DEFAULT_ENDPOINT,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    /// Build from a declarative config fragment
    ///
    /// # Errors
    /// `LineageError::Config` if `url` is missing, `LineageError::Transport`
    /// if the client cannot be built.
    pub fn from_config(config: &HttpConfig) -> Result<Self, LineageError> {
        let url = config.url.as_deref().ok_or_else(|| {
            LineageError::Config("http transport requires 'url'".to_string())
        })?;

        let timeout = config
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let connect_timeout = config
            .connect_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

        let mut transport = Self::build(
            url,
            config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT),
            timeout,
            connect_timeout,
        )
        .map_err(|source| LineageError::Transport {
            transport: "http".to_string(),
            source,
        })?;

        if let Some(key) = &config.api_key {
            transport = transport.api_key(key);
        }
        for (name, value) in config.headers.iter().flatten() {
            transport = transport.header(name, value);
        }
        Ok(transport)
    }

    fn build(
        base_url: &str,
        endpoint: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: join_url(base_url, endpoint),
            headers: HashMap::new(),
        })
    }

    /// Send `Authorization: Bearer <key>` with every request
    pub fn api_key(self, key: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", key.as_ref());
        self.header("Authorization", value)
    }

    /// Add a custom header to all requests
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Full URL events are posted to
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn emit(&self, event: &LineageEvent) -> Result<(), TransportError> {
        let mut request = self.client.post(&self.url).json(event);

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!(
                        url = %self.url,
                        event_type = %event.kind(),
                        status = %response.status(),
                        "Lineage event delivered"
                    );
                    Ok(())
                } else {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    error!(
                        url = %self.url,
                        status = %status,
                        body = %body,
                        "Lineage backend rejected event"
                    );
                    Err(TransportError::Rejected {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Err(e) if e.is_timeout() => {
                error!(url = %self.url, error = %e, "Lineage request timed out");
                Err(TransportError::Timeout(format!("{}: {}", self.url, e)))
            }
            Err(e) => {
                error!(url = %self.url, error = %e, "Lineage backend connection failed");
                Err(TransportError::Connection(format!(
                    "Failed to connect to {}: {}",
                    self.url, e
                )))
            }
        }
    }

    async fn health(&self) -> bool {
        // HEAD is less invasive than GET for POST-only endpoints
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                // Any non-5xx response means the server is reachable
                let healthy = !response.status().is_server_error();
                if !healthy {
                    debug!(
                        url = %self.url,
                        status = %response.status(),
                        "Health check returned server error"
                    );
                }
                healthy
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Health check failed");
                false
            }
        }
    }
}
