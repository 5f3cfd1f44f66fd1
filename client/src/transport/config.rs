//! Declarative transport selection
//!
//! The `type` field picks the variant:
//!
//! ```yaml
//! transport:
//!   type: http
//!   url: http://marquez:5000
//!   endpoint: /api/v1/lineage
//!   apiKey: secret
//! ```

use crate::config::merge::{Merge, merge_map, merge_value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    Http(HttpConfig),
    Console(ConsoleConfig),
    Noop,
    Composite(CompositeConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Console(ConsoleConfig::default())
    }
}

impl Merge for TransportConfig {
    /// Field-wise merge when both sides choose the same transport;
    /// a different `type` replaces the whole fragment.
    fn merge_with_non_null(&self, other: &Self) -> Self {
        match (self, other) {
            (TransportConfig::Http(a), TransportConfig::Http(b)) => {
                TransportConfig::Http(a.merge_with_non_null(b))
            }
            (TransportConfig::Console(a), TransportConfig::Console(b)) => {
                TransportConfig::Console(a.merge_with_non_null(b))
            }
            (TransportConfig::Composite(a), TransportConfig::Composite(b)) => {
                TransportConfig::Composite(a.merge_with_non_null(b))
            }
            (_, other) => other.clone(),
        }
    }
}

/// HTTP endpoint transport
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Path appended to `url`, defaults to `/api/v1/lineage`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Sent as `Authorization: Bearer <apiKey>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl Merge for HttpConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            url: merge_value(&self.url, &other.url),
            endpoint: merge_value(&self.endpoint, &other.endpoint),
            api_key: merge_value(&self.api_key, &other.api_key),
            timeout_ms: merge_value(&self.timeout_ms, &other.timeout_ms),
            connect_timeout_ms: merge_value(&self.connect_timeout_ms, &other.connect_timeout_ms),
            headers: merge_map(&self.headers, &other.headers),
        }
    }
}

/// Stdout transport for debugging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
}

impl Merge for ConsoleConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            pretty: merge_value(&self.pretty, &other.pretty),
        }
    }
}

/// Fan-out to several transports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeConfig {
    /// Replaced as a whole on merge; list positions carry no identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<TransportConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_failure: Option<bool>,
}

impl Merge for CompositeConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            transports: merge_value(&self.transports, &other.transports),
            continue_on_failure: merge_value(&self.continue_on_failure, &other.continue_on_failure),
        }
    }
}
