//! Resource-storage bridge for a Kubernetes-style metrics API server
//!
//! This crate provides:
//! - A scheme registry with per-group version priority
//! - API group installation into a generic API server
//! - Node and pod metrics storages backed by an entity index and a metrics sink
//! - An in-memory sink and entity indexes (static seed or cluster relist)
//! - The HTTP surface, health checks and observability

pub mod api;
pub mod error;
pub mod health;
pub mod index;
pub mod installer;
pub mod models;
pub mod observability;
pub mod scheme;
pub mod selector;
pub mod server;
pub mod sink;
pub mod storage;

pub use error::{ConfigurationError, InstallError, SinkError, StorageError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use installer::install_metrics_api;
pub use models::*;
pub use observability::{ApiServerMetrics, StructuredLogger};
pub use scheme::{install_metrics_types, ResourceKind, SchemeRegistry};
pub use selector::LabelSelector;
pub use server::{ApiGroupInfo, GenericApiServer};
pub use storage::{ListOptions, NodeMetricsStorage, PodMetricsStorage, ResourceStorage};
