//! Node metrics storage

use super::{async_trait, fetch_all, fetch_metrics, ListOptions, ResourceStorage};
use crate::error::StorageError;
use crate::index::NodeLister;
use crate::models::{EntityRef, MetricsList, MetricsResponse};
use crate::scheme::ResourceKind;
use crate::sink::MetricsSink;
use std::sync::Arc;
use tracing::debug;

/// Serves `NodeMetrics`, keyed by node name
pub struct NodeMetricsStorage {
    kind: ResourceKind,
    sink: Arc<dyn MetricsSink>,
    nodes: Arc<dyn NodeLister>,
}

impl NodeMetricsStorage {
    pub fn new(kind: ResourceKind, sink: Arc<dyn MetricsSink>, nodes: Arc<dyn NodeLister>) -> Self {
        Self { kind, sink, nodes }
    }
}

#[async_trait]
impl ResourceStorage for NodeMetricsStorage {
    fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    async fn get(&self, entity: &EntityRef) -> Result<MetricsResponse, StorageError> {
        let EntityRef::Node { name } = entity else {
            return Err(StorageError::NotFound(entity.clone()));
        };

        if self.nodes.get_node(name).await.is_none() {
            debug!(node = %name, "Node not in index");
            return Err(StorageError::NotFound(entity.clone()));
        }

        fetch_metrics(&self.kind, self.sink.as_ref(), entity.clone()).await
    }

    async fn list(&self, options: &ListOptions) -> Result<MetricsList, StorageError> {
        let entities = self
            .nodes
            .list_nodes(options.label_selector.as_ref())
            .await
            .iter()
            .map(|n| n.entity_ref())
            .collect();

        fetch_all(&self.kind, self.sink.as_ref(), entities).await
    }
}
