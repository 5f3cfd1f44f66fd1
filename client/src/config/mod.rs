//! Layered client configuration
//!
//! ```text
//! defaults ⊕ config file ⊕ environment  ──►  effective config
//! ```
//!
//! Each layer is an [`OpenLineageConfig`] whose unset fields defer to the
//! layer below (see [`merge`]). Integrations that need extra dataset rules
//! plug their own fragment type in as `D`; [`FlinkOpenLineageConfig`] is
//! the Flink flavour.

pub mod fragments;
pub mod merge;

use crate::breaker::CircuitBreakerConfig;
use crate::error::{LineageError, Result};
use crate::transport::{HttpConfig, TransportConfig};
use merge::{Merge, merge_map, merge_nested};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use fragments::{
    DatasetConfig, FacetsConfig, FlinkDatasetConfig, JobConfig, KafkaDatasetConfig, RunConfig,
};

/// Config file read by [`OpenLineageConfig::load`] when `OPENLINEAGE_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "openlineage.yml";

/// Full client configuration
///
/// Every fragment is optional; accessors resolve unset fragments to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLineageConfig<D = DatasetConfig> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<FacetsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<D>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    /// Constant tags attached to every client metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobConfig>,
}

/// Config for the Flink integration
pub type FlinkOpenLineageConfig = OpenLineageConfig<FlinkDatasetConfig>;

impl<D: Merge + Clone> Merge for OpenLineageConfig<D> {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            transport: merge_nested(&self.transport, &other.transport),
            facets: merge_nested(&self.facets, &other.facets),
            dataset: merge_nested(&self.dataset, &other.dataset),
            circuit_breaker: merge_nested(&self.circuit_breaker, &other.circuit_breaker),
            metrics: merge_map(&self.metrics, &other.metrics),
            run: merge_nested(&self.run, &other.run),
            job: merge_nested(&self.job, &other.job),
        }
    }
}

impl<D> OpenLineageConfig<D>
where
    D: Merge + Clone + Default + Serialize + for<'de> Deserialize<'de>,
{
    /// Built-in lowest layer: console transport, default facet filter,
    /// no-op breaker, no tags
    pub fn defaults() -> Self {
        Self {
            transport: Some(TransportConfig::default()),
            facets: Some(FacetsConfig::with_default_disabled()),
            circuit_breaker: Some(CircuitBreakerConfig::Noop),
            ..Default::default()
        }
    }

    /// Parse a YAML document
    ///
    /// # Errors
    /// `LineageError::Yaml` for malformed YAML or an unknown `type` discriminator.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LineageError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Override layer from `OPENLINEAGE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Override layer from any variable lookup
    ///
    /// - `OPENLINEAGE_DISABLED=true` selects the noop transport
    /// - `OPENLINEAGE_URL`, `OPENLINEAGE_ENDPOINT`, `OPENLINEAGE_API_KEY`
    ///   select (or patch) the http transport
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(disabled) = lookup("OPENLINEAGE_DISABLED") {
            let disabled: bool = disabled.trim().to_lowercase().parse().map_err(|e| {
                LineageError::Config(format!("invalid OPENLINEAGE_DISABLED: {e}"))
            })?;
            if disabled {
                config.transport = Some(TransportConfig::Noop);
                return Ok(config);
            }
        }

        let http = HttpConfig {
            url: lookup("OPENLINEAGE_URL"),
            endpoint: lookup("OPENLINEAGE_ENDPOINT"),
            api_key: lookup("OPENLINEAGE_API_KEY"),
            ..Default::default()
        };
        if http != HttpConfig::default() {
            config.transport = Some(TransportConfig::Http(http));
        }

        Ok(config)
    }

    /// Effective config: defaults, then the config file (if any), then env
    ///
    /// The file is `OPENLINEAGE_CONFIG` if set (and must exist), otherwise
    /// `openlineage.yml` in the working directory if present.
    pub fn load() -> Result<Self> {
        let explicit = env::var("OPENLINEAGE_CONFIG").ok().map(PathBuf::from);
        let file = match &explicit {
            Some(path) => Some(Self::from_file(path)?),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Some(Self::from_file(DEFAULT_CONFIG_FILE)?)
            }
            None => None,
        };
        debug!(from_file = file.is_some(), "Loading lineage config");

        let mut config = Self::defaults();
        if let Some(file) = file {
            config = config.merge_with_non_null(&file);
        }
        Ok(config.merge_with_non_null(&Self::from_env()?))
    }
}

impl<D> OpenLineageConfig<D> {
    pub fn transport_config(&self) -> TransportConfig {
        self.transport.clone().unwrap_or_default()
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        self.circuit_breaker.clone().unwrap_or_default()
    }

    /// Facets to strip; the built-in list unless `facets.disabled` is set
    ///
    /// An explicit empty list disables filtering.
    pub fn disabled_facets(&self) -> Vec<String> {
        match self.facets.as_ref().and_then(|f| f.disabled.as_ref()) {
            Some(disabled) => disabled.clone(),
            None => FacetsConfig::with_default_disabled()
                .disabled_facets()
                .to_vec(),
        }
    }

    pub fn metrics_tags(&self) -> HashMap<String, String> {
        self.metrics.clone().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::breaker::FailureBreakerConfig;
    use crate::transport::ConsoleConfig;
    use std::io::Write;

    const FULL_YAML: &str = r#"
transport:
  type: http
  url: http://marquez:5000
  apiKey: file-key
  headers:
    X-Team: data
facets:
  disabled: [spark_unknown]
circuitBreaker:
  type: failure
  failureThreshold: 3
metrics:
  env: prod
job:
  owners:
    team: data-eng
dataset:
  namespaceResolvers:
    db:5432: orders
"#;

    fn http_transport(config: &OpenLineageConfig) -> HttpConfig {
        match config.transport_config() {
            TransportConfig::Http(http) => http,
            other => panic!("expected http transport, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_full_yaml() {
        let config = OpenLineageConfig::<DatasetConfig>::from_yaml_str(FULL_YAML).unwrap();

        let http = http_transport(&config);
        assert_eq!(http.url.as_deref(), Some("http://marquez:5000"));
        assert_eq!(config.disabled_facets(), vec!["spark_unknown".to_string()]);
        assert_eq!(config.metrics_tags()["env"], "prod");
        assert!(matches!(
            config.circuit_breaker_config(),
            CircuitBreakerConfig::Failure(FailureBreakerConfig {
                failure_threshold: Some(3),
                ..
            })
        ));
        let dataset = config.dataset.unwrap();
        assert_eq!(dataset.resolve_namespace("pg://db:5432"), "pg://orders");
    }

    #[test]
    fn test_unknown_transport_type_fails_at_load() {
        let result =
            OpenLineageConfig::<DatasetConfig>::from_yaml_str("transport:\n  type: smoke\n");
        assert!(matches!(result, Err(LineageError::Yaml(_))));
    }

    #[test]
    fn test_merge_disjoint_fragments() {
        let a = OpenLineageConfig::<DatasetConfig> {
            transport: Some(TransportConfig::Noop),
            ..Default::default()
        };
        let b = OpenLineageConfig::<DatasetConfig> {
            facets: Some(FacetsConfig::with_default_disabled()),
            ..Default::default()
        };
        let a_before = a.clone();
        let b_before = b.clone();

        let merged = a.merge_with_non_null(&b);
        assert_eq!(merged.transport, Some(TransportConfig::Noop));
        assert_eq!(merged.facets, Some(FacetsConfig::with_default_disabled()));
        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let config = OpenLineageConfig::<DatasetConfig>::from_yaml_str(FULL_YAML).unwrap();
        assert_eq!(config.merge_with_non_null(&config), config);

        let defaults = OpenLineageConfig::<DatasetConfig>::defaults();
        assert_eq!(defaults.merge_with_non_null(&defaults), defaults);
    }

    #[test]
    fn test_env_patches_only_url() {
        let file = OpenLineageConfig::<DatasetConfig>::from_yaml_str(FULL_YAML).unwrap();
        let env = OpenLineageConfig::<DatasetConfig>::from_vars(|key| match key {
            "OPENLINEAGE_URL" => Some("http://override:5000".to_string()),
            _ => None,
        })
        .unwrap();

        let merged = file.merge_with_non_null(&env);
        let http = http_transport(&merged);
        assert_eq!(http.url.as_deref(), Some("http://override:5000"));
        assert_eq!(http.api_key.as_deref(), Some("file-key"));
        assert_eq!(http.headers.unwrap()["X-Team"], "data");
        assert_eq!(merged.metrics_tags()["env"], "prod");
    }

    #[test]
    fn test_env_disabled_selects_noop() {
        let env = OpenLineageConfig::<DatasetConfig>::from_vars(|key| match key {
            "OPENLINEAGE_DISABLED" => Some("TRUE".to_string()),
            "OPENLINEAGE_URL" => Some("http://ignored".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(env.transport, Some(TransportConfig::Noop));
    }

    #[test]
    fn test_env_invalid_bool() {
        let result = OpenLineageConfig::<DatasetConfig>::from_vars(|key| {
            (key == "OPENLINEAGE_DISABLED").then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(LineageError::Config(_))));
    }

    #[test]
    fn test_empty_env_is_empty_layer() {
        let env = OpenLineageConfig::<DatasetConfig>::from_vars(|_| None).unwrap();
        assert_eq!(env, OpenLineageConfig::default());
    }

    #[test]
    fn test_defaults_resolve() {
        let config = OpenLineageConfig::<DatasetConfig>::defaults();
        assert_eq!(
            config.transport_config(),
            TransportConfig::Console(ConsoleConfig::default())
        );
        assert_eq!(config.circuit_breaker_config(), CircuitBreakerConfig::Noop);
        assert!(config.metrics_tags().is_empty());
        assert!(config.disabled_facets().contains(&"spark_unknown".to_string()));
    }

    #[test]
    fn test_unset_facets_fall_back_to_default_filter() {
        let expected: Vec<String> = fragments::DEFAULT_DISABLED_FACETS
            .iter()
            .map(|s| s.to_string())
            .collect();

        let no_facets =
            OpenLineageConfig::<DatasetConfig>::from_yaml_str("transport:\n  type: noop\n")
                .unwrap();
        assert_eq!(no_facets.disabled_facets(), expected);

        let no_disabled = OpenLineageConfig::<DatasetConfig>::from_yaml_str(
            "facets:\n  customEnvironmentVariables: [HOME]\n",
        )
        .unwrap();
        assert_eq!(no_disabled.disabled_facets(), expected);

        let explicit_empty =
            OpenLineageConfig::<DatasetConfig>::from_yaml_str("facets:\n  disabled: []\n")
                .unwrap();
        assert!(explicit_empty.disabled_facets().is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_YAML.as_bytes()).unwrap();

        let config = OpenLineageConfig::<DatasetConfig>::from_file(file.path()).unwrap();
        assert!(config.job.is_some());

        let missing = OpenLineageConfig::<DatasetConfig>::from_file("/nonexistent/openlineage.yml");
        assert!(matches!(missing, Err(LineageError::Config(_))));
    }

    #[test]
    fn test_flink_config_routes_dataset_through_merge() {
        let base = FlinkOpenLineageConfig::from_yaml_str(
            "dataset:\n  trimSuffixes: [/v1]\n  kafka:\n    resolveTopicPattern: false\n",
        )
        .unwrap();
        let overrides = FlinkOpenLineageConfig::from_yaml_str(
            "dataset:\n  kafka:\n    resolveTopicPattern: true\ntransport:\n  type: noop\n",
        )
        .unwrap();

        let merged = base.merge_with_non_null(&overrides);
        let dataset = merged.dataset.unwrap();
        assert_eq!(dataset.base.trim_suffixes, Some(vec!["/v1".to_string()]));
        assert_eq!(dataset.kafka.unwrap().resolve_topic_pattern, Some(true));
        assert_eq!(merged.transport, Some(TransportConfig::Noop));
    }
}
