//! Resource storages for the metrics API group
//!
//! A storage answers get/list for one resource kind by checking the entity
//! index for existence and then reading the latest samples from the sink.
//!
//! The two lookups are not atomic. Existence is checked once, before the sink
//! is queried, and is never re-checked: an entity deleted in between still
//! gets whatever samples the sink returns. A list works from the index
//! snapshot taken up front in the same way.

mod node;
mod pod;


pub use node::NodeMetricsStorage;
pub use pod::PodMetricsStorage;

use crate::error::StorageError;
use crate::models::{EntityRef, MetricsList, MetricsResponse};
use crate::scheme::ResourceKind;
use crate::selector::LabelSelector;
use crate::sink::MetricsSink;
use chrono::Utc;
use tracing::warn;

pub use async_trait::async_trait;

/// Options accepted by [`ResourceStorage::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Restrict namespaced resources to one namespace
    pub namespace: Option<String>,
    pub label_selector: Option<LabelSelector>,
}

impl ListOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            label_selector: None,
        }
    }

    pub fn with_selector(mut self, selector: LabelSelector) -> Self {
        self.label_selector = Some(selector);
        self
    }
}

/// Read-only storage behind one served resource
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    /// Kind this storage serves
    fn kind(&self) -> &ResourceKind;

    fn namespaced(&self) -> bool {
        self.kind().namespaced
    }

    async fn get(&self, entity: &EntityRef) -> Result<MetricsResponse, StorageError>;

    async fn list(&self, options: &ListOptions) -> Result<MetricsList, StorageError>;
}

/// Build the response for an entity already known to exist
async fn fetch_metrics(
    kind: &ResourceKind,
    sink: &dyn MetricsSink,
    entity: EntityRef,
) -> Result<MetricsResponse, StorageError> {
    let samples = sink.latest_samples(&entity).await.map_err(|e| {
        warn!(entity = %entity, error = %e, "Metrics sink lookup failed");
        StorageError::from(e)
    })?;

    Ok(MetricsResponse::new(kind, entity, samples, Utc::now()))
}

/// Fetch metrics for each entity, keeping the given order
async fn fetch_all(
    kind: &ResourceKind,
    sink: &dyn MetricsSink,
    entities: Vec<EntityRef>,
) -> Result<MetricsList, StorageError> {
    let mut items = Vec::with_capacity(entities.len());
    for entity in entities {
        items.push(fetch_metrics(kind, sink, entity).await?);
    }
    Ok(MetricsList::new(kind, items))
}
