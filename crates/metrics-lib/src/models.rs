//! Core data models for the metrics API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::scheme::ResourceKind;

/// Kind of cluster entity a metrics resource describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Pod,
}

/// Reference to a cluster entity
///
/// Serialized as object metadata: `{"name": ..}` for nodes and
/// `{"namespace": .., "name": ..}` for pods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    // Pod comes first so untagged deserialization does not swallow the namespace
    Pod { namespace: String, name: String },
    Node { name: String },
}

impl EntityRef {
    pub fn node(name: impl Into<String>) -> Self {
        EntityRef::Node { name: name.into() }
    }

    pub fn pod(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        EntityRef::Pod {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Node { .. } => EntityKind::Node,
            EntityRef::Pod { .. } => EntityKind::Pod,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityRef::Node { name } | EntityRef::Pod { name, .. } => name,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            EntityRef::Node { .. } => None,
            EntityRef::Pod { namespace, .. } => Some(namespace),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Node { name } => write!(f, "node {}", name),
            EntityRef::Pod { namespace, name } => write!(f, "pod {}/{}", namespace, name),
        }
    }
}

/// Numeric value with its unit, e.g. `0.5` cores or `200` `Mi`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// One observed metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub quantity: Quantity,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, quantity: Quantity, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            quantity,
            timestamp,
        }
    }
}

/// Aggregation period covered by a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ObservationWindow {
    /// Window spanning the earliest to latest sample, or zero-length at `now`
    pub fn covering(samples: &[MetricSample], now: DateTime<Utc>) -> Self {
        let start = samples.iter().map(|s| s.timestamp).min();
        let end = samples.iter().map(|s| s.timestamp).max();

        match (start, end) {
            (Some(start), Some(end)) => Self { start, end },
            _ => Self {
                start: now,
                end: now,
            },
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Typed metrics object returned for a single node or pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    #[serde(rename = "metadata")]
    pub entity: EntityRef,
    pub window: ObservationWindow,
    /// Samples in the sink's order
    pub samples: Vec<MetricSample>,
}

impl MetricsResponse {
    pub fn new(
        kind: &ResourceKind,
        entity: EntityRef,
        samples: Vec<MetricSample>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            api_version: kind.api_version(),
            kind: kind.kind.clone(),
            window: ObservationWindow::covering(&samples, now),
            entity,
            samples,
        }
    }

    pub fn sample(&self, name: &str) -> Option<&MetricSample> {
        self.samples.iter().find(|s| s.name == name)
    }
}

/// List form of [`MetricsResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsList {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub items: Vec<MetricsResponse>,
}

impl MetricsList {
    pub fn new(kind: &ResourceKind, items: Vec<MetricsResponse>) -> Self {
        Self {
            api_version: kind.api_version(),
            kind: kind.list_kind(),
            items,
        }
    }
}

/// Node entry held by an entity index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::node(&self.name)
    }
}

/// Pod entry held by an entity index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Pod {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::pod(&self.namespace, &self.name)
    }
}
