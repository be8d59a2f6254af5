//! In-memory entity index
//!
//! Entries are kept in ordered maps, so enumeration is by name for nodes and
//! by namespace then name for pods.

use super::{async_trait, NodeLister, PodLister};
use crate::models::{Node, Pod};
use crate::selector::LabelSelector;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Seed file contents for a statically configured index
#[derive(Debug, Default, Deserialize)]
pub struct EntitySeed {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub pods: Vec<Pod>,
}

#[derive(Debug, Default)]
pub struct MemoryEntityIndex {
    nodes: RwLock<BTreeMap<String, Node>>,
    pods: RwLock<BTreeMap<(String, String), Pod>>,
}

impl MemoryEntityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: EntitySeed) -> Self {
        let nodes = seed
            .nodes
            .into_iter()
            .map(|n| (n.name.clone(), n))
            .collect();
        let pods = seed
            .pods
            .into_iter()
            .map(|p| ((p.namespace.clone(), p.name.clone()), p))
            .collect();

        Self {
            nodes: RwLock::new(nodes),
            pods: RwLock::new(pods),
        }
    }

    /// Load a JSON seed of the form `{"nodes": [..], "pods": [..]}`
    pub async fn from_seed_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read entity seed {}", path.display()))?;
        let seed: EntitySeed =
            serde_json::from_str(&content).context("Failed to parse entity seed")?;

        info!(
            path = %path.display(),
            nodes = seed.nodes.len(),
            pods = seed.pods.len(),
            "Loaded entity seed"
        );
        Ok(Self::from_seed(seed))
    }

    pub async fn upsert_node(&self, node: Node) {
        debug!(node = %node.name, "Indexing node");
        self.nodes.write().await.insert(node.name.clone(), node);
    }

    pub async fn remove_node(&self, name: &str) -> Option<Node> {
        debug!(node = %name, "Removing node from index");
        self.nodes.write().await.remove(name)
    }

    pub async fn upsert_pod(&self, pod: Pod) {
        debug!(namespace = %pod.namespace, pod = %pod.name, "Indexing pod");
        let key = (pod.namespace.clone(), pod.name.clone());
        self.pods.write().await.insert(key, pod);
    }

    pub async fn remove_pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        debug!(namespace = %namespace, pod = %name, "Removing pod from index");
        self.pods
            .write()
            .await
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Swap in a complete node snapshot
    pub async fn replace_nodes(&self, nodes: Vec<Node>) {
        let snapshot = nodes.into_iter().map(|n| (n.name.clone(), n)).collect();
        *self.nodes.write().await = snapshot;
    }

    /// Swap in a complete pod snapshot
    pub async fn replace_pods(&self, pods: Vec<Pod>) {
        let snapshot = pods
            .into_iter()
            .map(|p| ((p.namespace.clone(), p.name.clone()), p))
            .collect();
        *self.pods.write().await = snapshot;
    }

    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn pod_count(&self) -> usize {
        self.pods.read().await.len()
    }
}

fn selected(selector: Option<&LabelSelector>, labels: &BTreeMap<String, String>) -> bool {
    selector.map(|s| s.matches(labels)).unwrap_or(true)
}

#[async_trait]
impl NodeLister for MemoryEntityIndex {
    async fn get_node(&self, name: &str) -> Option<Node> {
        self.nodes.read().await.get(name).cloned()
    }

    async fn list_nodes(&self, selector: Option<&LabelSelector>) -> Vec<Node> {
        self.nodes
            .read()
            .await
            .values()
            .filter(|n| selected(selector, &n.labels))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PodLister for MemoryEntityIndex {
    async fn get_pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        selector: Option<&LabelSelector>,
    ) -> Vec<Pod> {
        self.pods
            .read()
            .await
            .values()
            .filter(|p| namespace.map(|ns| p.namespace == ns).unwrap_or(true))
            .filter(|p| selected(selector, &p.labels))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_node_lifecycle() {
        let index = MemoryEntityIndex::new();
        index.upsert_node(Node::new("n1")).await;
        assert_eq!(index.node_count().await, 1);
        assert_eq!(index.get_node("n1").await, Some(Node::new("n1")));

        index.remove_node("n1").await;
        assert!(index.get_node("n1").await.is_none());
    }

    #[tokio::test]
    async fn test_pods_are_keyed_by_namespace() {
        let index = MemoryEntityIndex::new();
        index.upsert_pod(Pod::new("ns1", "p1")).await;
        index.upsert_pod(Pod::new("ns2", "p1")).await;

        assert!(index.get_pod("ns1", "p1").await.is_some());
        assert!(index.get_pod("ns3", "p1").await.is_none());
        assert_eq!(index.list_pods(Some("ns2"), None).await, vec![Pod::new("ns2", "p1")]);
        assert_eq!(index.list_pods(None, None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_list_filters_by_selector() {
        let index = MemoryEntityIndex::new();
        index
            .upsert_node(Node::new("n1").with_label("role", "worker"))
            .await;
        index
            .upsert_node(Node::new("n2").with_label("role", "control-plane"))
            .await;

        let selector: LabelSelector = "role=worker".parse().unwrap();
        let nodes = index.list_nodes(Some(&selector)).await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "n1");
    }

    #[tokio::test]
    async fn test_replace_drops_missing_entities() {
        let index = MemoryEntityIndex::new();
        index.upsert_node(Node::new("old")).await;
        index
            .replace_nodes(vec![Node::new("b"), Node::new("a")])
            .await;

        let names: Vec<String> = index
            .list_nodes(None)
            .await
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_load_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nodes": [{{"name": "n1", "labels": {{"zone": "a"}}}}],
                "pods": [{{"namespace": "ns1", "name": "p1"}}]}}"#
        )
        .unwrap();

        let index = MemoryEntityIndex::from_seed_file(file.path()).await.unwrap();
        assert_eq!(index.node_count().await, 1);
        assert_eq!(index.pod_count().await, 1);
        assert_eq!(
            index.get_node("n1").await.unwrap().labels.get("zone").map(String::as_str),
            Some("a")
        );
    }

    #[tokio::test]
    async fn test_load_missing_seed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = MemoryEntityIndex::from_seed_file(&dir.path().join("missing.json")).await;
        assert!(result.is_err());
    }
}
