//! Pod metrics storage

use super::{async_trait, fetch_all, fetch_metrics, ListOptions, ResourceStorage};
use crate::error::StorageError;
use crate::index::PodLister;
use crate::models::{EntityRef, MetricsList, MetricsResponse};
use crate::scheme::ResourceKind;
use crate::sink::MetricsSink;
use std::sync::Arc;
use tracing::debug;

/// Serves `PodMetrics`, keyed by namespace and pod name
pub struct PodMetricsStorage {
    kind: ResourceKind,
    sink: Arc<dyn MetricsSink>,
    pods: Arc<dyn PodLister>,
}

impl PodMetricsStorage {
    pub fn new(kind: ResourceKind, sink: Arc<dyn MetricsSink>, pods: Arc<dyn PodLister>) -> Self {
        Self { kind, sink, pods }
    }
}

#[async_trait]
impl ResourceStorage for PodMetricsStorage {
    fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    async fn get(&self, entity: &EntityRef) -> Result<MetricsResponse, StorageError> {
        let EntityRef::Pod { namespace, name } = entity else {
            return Err(StorageError::NotFound(entity.clone()));
        };

        if self.pods.get_pod(namespace, name).await.is_none() {
            debug!(namespace = %namespace, pod = %name, "Pod not in index");
            return Err(StorageError::NotFound(entity.clone()));
        }

        fetch_metrics(&self.kind, self.sink.as_ref(), entity.clone()).await
    }

    async fn list(&self, options: &ListOptions) -> Result<MetricsList, StorageError> {
        let entities = self
            .pods
            .list_pods(options.namespace.as_deref(), options.label_selector.as_ref())
            .await
            .iter()
            .map(|p| p.entity_ref())
            .collect();

        fetch_all(&self.kind, self.sink.as_ref(), entities).await
    }
}
