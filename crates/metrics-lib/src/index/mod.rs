//! Cluster entity index
//!
//! An eventually-consistent view of which nodes and pods currently exist.
//! Storages only read from it; label matching is owned here.

mod cluster;
mod memory;

pub use cluster::{KubeEntityIndex, KubeIndexConfig};
pub use memory::{EntitySeed, MemoryEntityIndex};

use crate::models::{Node, Pod};
use crate::selector::LabelSelector;

pub use async_trait::async_trait;

/// Node view of the entity index
#[async_trait]
pub trait NodeLister: Send + Sync {
    async fn get_node(&self, name: &str) -> Option<Node>;

    /// Nodes matching `selector`, in the index's enumeration order
    async fn list_nodes(&self, selector: Option<&LabelSelector>) -> Vec<Node>;
}

/// Pod view of the entity index
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn get_pod(&self, namespace: &str, name: &str) -> Option<Pod>;

    /// Pods matching `selector`, optionally restricted to one namespace
    async fn list_pods(&self, namespace: Option<&str>, selector: Option<&LabelSelector>)
        -> Vec<Pod>;
}

/// Full entity index exposing both views
pub trait EntityIndex: NodeLister + PodLister {}

impl<T: NodeLister + PodLister> EntityIndex for T {}
