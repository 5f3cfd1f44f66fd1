//! Config fragments for facets, runs, jobs and datasets

use super::merge::{Merge, merge_map, merge_nested, merge_value};
use crate::event::{Job, Run};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

/// Facets that are noisy or unbounded in size and are dropped unless a
/// config says otherwise
pub const DEFAULT_DISABLED_FACETS: [&str; 2] = ["spark_unknown", "spark.logicalPlan"];

/// Facet filtering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetsConfig {
    /// Facet names stripped from every event before delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<Vec<String>>,

    /// Environment variables captured by integrations into an environment facet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_environment_variables: Option<Vec<String>>,
}

impl FacetsConfig {
    /// The built-in facet filter
    pub fn with_default_disabled() -> Self {
        Self {
            disabled: Some(DEFAULT_DISABLED_FACETS.iter().map(|s| s.to_string()).collect()),
            custom_environment_variables: None,
        }
    }

    pub fn disabled_facets(&self) -> &[String] {
        self.disabled.as_deref().unwrap_or_default()
    }
}

impl Merge for FacetsConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            disabled: merge_value(&self.disabled, &other.disabled),
            custom_environment_variables: merge_value(
                &self.custom_environment_variables,
                &other.custom_environment_variables,
            ),
        }
    }
}

/// Parent run information attached to every run an integration reports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_job_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_job_name: Option<String>,
}

impl RunConfig {
    /// The `parent` run facet, if the parent is fully specified
    pub fn parent_facet(&self) -> Option<serde_json::Value> {
        let (Some(run_id), Some(namespace), Some(name)) = (
            self.parent_run_id,
            self.parent_job_namespace.as_ref(),
            self.parent_job_name.as_ref(),
        ) else {
            return None;
        };
        Some(json!({
            "run": { "runId": run_id },
            "job": { "namespace": namespace, "name": name },
        }))
    }

    /// Attach the parent facet to `run` unless it already has one
    ///
    /// Called by integrations while building run events; the client
    /// delivers events as given.
    pub fn apply_to(&self, run: &mut Run) {
        if let Some(facet) = self.parent_facet() {
            run.facets.entry("parent".to_string()).or_insert(facet);
        }
    }
}

impl Merge for RunConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            parent_run_id: merge_value(&self.parent_run_id, &other.parent_run_id),
            parent_job_namespace: merge_value(
                &self.parent_job_namespace,
                &other.parent_job_namespace,
            ),
            parent_job_name: merge_value(&self.parent_job_name, &other.parent_job_name),
        }
    }
}

/// Job identity overrides and ownership
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owner type (e.g. "team") to owner name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl JobConfig {
    /// Apply namespace/name overrides and the ownership facet to `job`
    ///
    /// Called by integrations while building job and run events.
    pub fn apply_to(&self, job: &mut Job) {
        if let Some(namespace) = &self.namespace {
            job.namespace.clone_from(namespace);
        }
        if let Some(name) = &self.name {
            job.name.clone_from(name);
        }
        if let Some(owners) = self.owners.as_ref().filter(|o| !o.is_empty()) {
            let mut owners: Vec<_> = owners
                .iter()
                .map(|(kind, name)| json!({ "name": name, "type": kind }))
                .collect();
            owners.sort_by(|a, b| a["type"].as_str().cmp(&b["type"].as_str()));
            job.facets
                .insert("ownership".to_string(), json!({ "owners": owners }));
        }
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            let mut tags: Vec<_> = tags
                .iter()
                .map(|(key, value)| json!({ "key": key, "value": value, "source": "CONFIG" }))
                .collect();
            tags.sort_by(|a, b| a["key"].as_str().cmp(&b["key"].as_str()));
            job.facets.insert("tags".to_string(), json!({ "tags": tags }));
        }
    }
}

impl Merge for JobConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            namespace: merge_value(&self.namespace, &other.namespace),
            name: merge_value(&self.name, &other.name),
            owners: merge_map(&self.owners, &other.owners),
            tags: merge_map(&self.tags, &other.tags),
        }
    }
}

/// Dataset naming rules shared by every integration
///
/// Integrations resolve dataset namespaces and names through these helpers
/// before building events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetConfig {
    /// Host (or host:port) to logical namespace name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_resolvers: Option<HashMap<String, String>>,

    /// Suffixes trimmed from dataset names, e.g. partition directories
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_suffixes: Option<Vec<String>>,
}

impl DatasetConfig {
    /// Map a physical namespace onto its configured logical name
    ///
    /// `postgres://db.internal:5432` with a resolver `db.internal:5432 -> orders-db`
    /// becomes `postgres://orders-db`.
    pub fn resolve_namespace(&self, namespace: &str) -> String {
        let Some(resolvers) = &self.namespace_resolvers else {
            return namespace.to_string();
        };
        let (scheme, host) = match namespace.split_once("://") {
            Some((scheme, rest)) => (Some(scheme), rest),
            None => (None, namespace),
        };
        match resolvers.get(host) {
            Some(resolved) => match scheme {
                Some(scheme) => format!("{scheme}://{resolved}"),
                None => resolved.clone(),
            },
            None => namespace.to_string(),
        }
    }

    /// Strip the first configured suffix that matches `name`
    pub fn trim_name<'a>(&self, name: &'a str) -> &'a str {
        self.trim_suffixes
            .iter()
            .flatten()
            .find_map(|suffix| name.strip_suffix(suffix.as_str()))
            .unwrap_or(name)
    }
}

impl Merge for DatasetConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            namespace_resolvers: merge_map(&self.namespace_resolvers, &other.namespace_resolvers),
            trim_suffixes: merge_value(&self.trim_suffixes, &other.trim_suffixes),
        }
    }
}

/// Kafka source/sink naming for the Flink integration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KafkaDatasetConfig {
    /// Report each topic matched by a subscription pattern as its own dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_topic_pattern: Option<bool>,
}

impl Merge for KafkaDatasetConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            resolve_topic_pattern: merge_value(
                &self.resolve_topic_pattern,
                &other.resolve_topic_pattern,
            ),
        }
    }
}

/// Dataset config for the Flink integration: the shared rules plus Kafka
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlinkDatasetConfig {
    #[serde(flatten)]
    pub base: DatasetConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka: Option<KafkaDatasetConfig>,
}

impl Merge for FlinkDatasetConfig {
    fn merge_with_non_null(&self, other: &Self) -> Self {
        Self {
            base: self.base.merge_with_non_null(&other.base),
            kafka: merge_nested(&self.kafka, &other.kafka),
        }
    }
}
