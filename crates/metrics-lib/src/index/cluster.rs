//! Kubernetes-backed entity index
//!
//! Periodically lists nodes and pods from the cluster API and republishes
//! them into a [`MemoryEntityIndex`]. Between refreshes the index may lag
//! behind the cluster.

use super::MemoryEntityIndex;
use crate::health::{components, HealthRegistry};
use crate::models::{Node, Pod};
use crate::observability::ApiServerMetrics;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1 as core;
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct KubeIndexConfig {
    /// Time between full relists
    pub resync_interval: Duration,
}

impl Default for KubeIndexConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(30),
        }
    }
}

pub struct KubeEntityIndex {
    client: Client,
    index: Arc<MemoryEntityIndex>,
    config: KubeIndexConfig,
    health_registry: HealthRegistry,
    metrics: ApiServerMetrics,
}

impl KubeEntityIndex {
    pub fn new(
        client: Client,
        index: Arc<MemoryEntityIndex>,
        config: KubeIndexConfig,
        health_registry: HealthRegistry,
        metrics: ApiServerMetrics,
    ) -> Self {
        Self {
            client,
            index,
            config,
            health_registry,
            metrics,
        }
    }

    /// Index the refresher publishes into
    pub fn index(&self) -> Arc<MemoryEntityIndex> {
        self.index.clone()
    }

    /// List nodes and pods once and swap them into the index
    pub async fn refresh(&self) -> Result<(usize, usize)> {
        let params = ListParams::default();

        let nodes: Api<core::Node> = Api::all(self.client.clone());
        let nodes: Vec<Node> = nodes
            .list(&params)
            .await
            .context("Failed to list nodes")?
            .into_iter()
            .filter_map(node_from_object)
            .collect();

        let pods: Api<core::Pod> = Api::all(self.client.clone());
        let pods: Vec<Pod> = pods
            .list(&params)
            .await
            .context("Failed to list pods")?
            .into_iter()
            .filter_map(pod_from_object)
            .collect();

        let counts = (nodes.len(), pods.len());
        self.index.replace_nodes(nodes).await;
        self.index.replace_pods(pods).await;
        self.metrics.set_index_size(counts.0 as i64, counts.1 as i64);

        Ok(counts)
    }

    /// Refresh until `shutdown` fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            resync_secs = self.config.resync_interval.as_secs(),
            "Starting entity index refresh loop"
        );

        let mut ticker = interval(self.config.resync_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok((nodes, pods)) => {
                            debug!(nodes, pods, "Entity index refreshed");
                            self.health_registry.set_healthy(components::ENTITY_INDEX).await;
                        }
                        Err(e) => {
                            // Keep serving the previous snapshot
                            warn!(error = %e, "Entity index refresh failed");
                            self.metrics.inc_index_refresh_errors();
                            self.health_registry
                                .set_degraded(components::ENTITY_INDEX, e.to_string())
                                .await;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down entity index refresh loop");
                    break;
                }
            }
        }
    }
}

fn node_from_object(node: core::Node) -> Option<Node> {
    let name = node.metadata.name?;
    Some(Node {
        name,
        labels: node.metadata.labels.unwrap_or_default(),
    })
}

fn pod_from_object(pod: core::Pod) -> Option<Pod> {
    let name = pod.metadata.name?;
    let namespace = pod.metadata.namespace.unwrap_or_else(|| "default".to_string());
    Some(Pod {
        namespace,
        name,
        labels: pod.metadata.labels.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_node_conversion_keeps_labels() {
        let object = core::Node {
            metadata: ObjectMeta {
                name: Some("n1".to_string()),
                labels: Some(BTreeMap::from([("zone".to_string(), "a".to_string())])),
                ..Default::default()
            },
            ..Default::default()
        };

        let node = node_from_object(object).unwrap();
        assert_eq!(node, Node::new("n1").with_label("zone", "a"));
    }

    #[test]
    fn test_unnamed_objects_are_skipped() {
        assert!(node_from_object(core::Node::default()).is_none());
        assert!(pod_from_object(core::Pod::default()).is_none());
    }

    #[test]
    fn test_pod_without_namespace_lands_in_default() {
        let object = core::Pod {
            metadata: ObjectMeta {
                name: Some("p1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let pod = pod_from_object(object).unwrap();
        assert_eq!(pod.entity_ref().namespace(), Some("default"));
    }
}
