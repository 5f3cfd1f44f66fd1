//! Lineage event model
//!
//! A [`LineageEvent`] is one of three immutable observations:
//!
//! ```text
//! RunEvent      run + job + inputs/outputs   (a run changed state)
//! JobEvent      job + inputs/outputs         (static job metadata)
//! DatasetEvent  dataset                      (static dataset metadata)
//! ```
//!
//! Extraction adapters build the events; the client only reads them and,
//! when facet filtering is configured, delivers a filtered copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Producer URI stamped on events built with the convenience constructors
pub const DEFAULT_PRODUCER: &str = concat!(
    "urn:",
    env!("CARGO_PKG_NAME"),
    ":",
    env!("CARGO_PKG_VERSION")
);

/// Schema the serialized events conform to
pub const SCHEMA_URL: &str = "https://openlineage.io/spec/2-0-2/OpenLineage.json";

/// Facets keyed by name, kept in name order
pub type Facets = BTreeMap<String, Value>;

/// Run lifecycle transition carried by a [`RunEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Start,
    Running,
    Complete,
    Abort,
    Fail,
    Other,
}

/// A single execution of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: Facets,
}

impl Run {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            facets: Facets::new(),
        }
    }

    /// Run with a freshly generated v4 id
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }

    pub fn with_facet(mut self, name: impl Into<String>, facet: Value) -> Self {
        self.facets.insert(name.into(), facet);
        self
    }
}

/// A recurring unit of work, identified by namespace and name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: Facets,
}

impl Job {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            facets: Facets::new(),
        }
    }

    pub fn with_facet(mut self, name: impl Into<String>, facet: Value) -> Self {
        self.facets.insert(name.into(), facet);
        self
    }
}

/// A dataset read or written by a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: Facets,
}

impl Dataset {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            facets: Facets::new(),
        }
    }

    pub fn with_facet(mut self, name: impl Into<String>, facet: Value) -> Self {
        self.facets.insert(name.into(), facet);
        self
    }
}

/// A run changed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub event_time: DateTime<Utc>,
    pub producer: String,
    #[serde(rename = "schemaURL")]
    pub schema_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<RunState>,
    pub run: Run,
    pub job: Job,
    #[serde(default)]
    pub inputs: Vec<Dataset>,
    #[serde(default)]
    pub outputs: Vec<Dataset>,
}

impl RunEvent {
    /// Create a RunEvent stamped now with the default producer
    pub fn new(event_type: RunState, run: Run, job: Job) -> Self {
        Self {
            event_time: Utc::now(),
            producer: DEFAULT_PRODUCER.to_string(),
            schema_url: SCHEMA_URL.to_string(),
            event_type: Some(event_type),
            run,
            job,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Dataset>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Dataset>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }
}

/// Static metadata about a job, outside of any run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub event_time: DateTime<Utc>,
    pub producer: String,
    #[serde(rename = "schemaURL")]
    pub schema_url: String,
    pub job: Job,
    #[serde(default)]
    pub inputs: Vec<Dataset>,
    #[serde(default)]
    pub outputs: Vec<Dataset>,
}

impl JobEvent {
    pub fn new(job: Job) -> Self {
        Self {
            event_time: Utc::now(),
            producer: DEFAULT_PRODUCER.to_string(),
            schema_url: SCHEMA_URL.to_string(),
            job,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<Dataset>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Dataset>) -> Self {
        self.outputs = outputs;
        self
    }
}

/// Static metadata about a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEvent {
    pub event_time: DateTime<Utc>,
    pub producer: String,
    #[serde(rename = "schemaURL")]
    pub schema_url: String,
    pub dataset: Dataset,
}

impl DatasetEvent {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            event_time: Utc::now(),
            producer: DEFAULT_PRODUCER.to_string(),
            schema_url: SCHEMA_URL.to_string(),
            dataset,
        }
    }
}

/// Which variant an event is; used as the metrics label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Run,
    Job,
    Dataset,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Run, EventKind::Job, EventKind::Dataset];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Run => "run_event",
            EventKind::Job => "job_event",
            EventKind::Dataset => "dataset_event",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any lineage event
///
/// Serialized untagged: the wire payload is the bare variant object. On
/// deserialization the top-level key picks the variant (`run`, then `job`,
/// then `dataset`) and that variant's own error is reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LineageEvent {
    Run(RunEvent),
    Job(JobEvent),
    Dataset(DatasetEvent),
}

impl LineageEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LineageEvent::Run(_) => EventKind::Run,
            LineageEvent::Job(_) => EventKind::Job,
            LineageEvent::Dataset(_) => EventKind::Dataset,
        }
    }

    /// Returns true if any facet map on this event holds one of `names`
    pub fn has_any_facet(&self, names: &[String]) -> bool {
        if names.is_empty() {
            return false;
        }
        self.facet_maps()
            .into_iter()
            .any(|facets| names.iter().any(|n| facets.contains_key(n)))
    }

    /// Copy of this event with the named facets removed everywhere
    pub fn without_facets(&self, names: &[String]) -> LineageEvent {
        let mut filtered = self.clone();
        for facets in filtered.facet_maps_mut() {
            facets.retain(|name, _| !names.contains(name));
        }
        filtered
    }

    fn facet_maps(&self) -> Vec<&Facets> {
        match self {
            LineageEvent::Run(e) => [&e.run.facets, &e.job.facets]
                .into_iter()
                .chain(e.inputs.iter().chain(&e.outputs).map(|d| &d.facets))
                .collect(),
            LineageEvent::Job(e) => std::iter::once(&e.job.facets)
                .chain(e.inputs.iter().chain(&e.outputs).map(|d| &d.facets))
                .collect(),
            LineageEvent::Dataset(e) => vec![&e.dataset.facets],
        }
    }

    fn facet_maps_mut(&mut self) -> Vec<&mut Facets> {
        match self {
            LineageEvent::Run(e) => [&mut e.run.facets, &mut e.job.facets]
                .into_iter()
                .chain(
                    e.inputs
                        .iter_mut()
                        .chain(e.outputs.iter_mut())
                        .map(|d| &mut d.facets),
                )
                .collect(),
            LineageEvent::Job(e) => std::iter::once(&mut e.job.facets)
                .chain(
                    e.inputs
                        .iter_mut()
                        .chain(e.outputs.iter_mut())
                        .map(|d| &mut d.facets),
                )
                .collect(),
            LineageEvent::Dataset(e) => vec![&mut e.dataset.facets],
        }
    }
}

impl<'de> Deserialize<'de> for LineageEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Some(object) = value.as_object() else {
            return Err(de::Error::custom("lineage event must be a JSON object"));
        };

        let event = if object.contains_key("run") {
            RunEvent::deserialize(value).map(LineageEvent::Run)
        } else if object.contains_key("job") {
            JobEvent::deserialize(value).map(LineageEvent::Job)
        } else if object.contains_key("dataset") {
            DatasetEvent::deserialize(value).map(LineageEvent::Dataset)
        } else {
            return Err(de::Error::custom(
                "lineage event needs a 'run', 'job' or 'dataset' field",
            ));
        };
        event.map_err(de::Error::custom)
    }
}

impl From<RunEvent> for LineageEvent {
    fn from(event: RunEvent) -> Self {
        LineageEvent::Run(event)
    }
}

impl From<JobEvent> for LineageEvent {
    fn from(event: JobEvent) -> Self {
        LineageEvent::Job(event)
    }
}

impl From<DatasetEvent> for LineageEvent {
    fn from(event: DatasetEvent) -> Self {
        LineageEvent::Dataset(event)
    }
}
