//! Metrics sink: most recent samples per entity

mod memory;

pub use memory::{MemoryMetricsSink, SinkStats};

use crate::error::SinkError;
use crate::models::{EntityRef, MetricSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use async_trait::async_trait;

/// Read side of a metrics store
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Latest samples for `entity`, in the sink's internal order
    ///
    /// An empty result means the sink has nothing for the entity yet.
    async fn latest_samples(&self, entity: &EntityRef) -> Result<Vec<MetricSample>, SinkError>;
}

/// Samples observed for one entity in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetrics {
    pub entity: EntityRef,
    pub samples: Vec<MetricSample>,
}

/// A set of samples scraped at the same time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBatch {
    pub timestamp: DateTime<Utc>,
    pub entities: Vec<EntityMetrics>,
}

impl MetricsBatch {
    pub fn sample_count(&self) -> usize {
        self.entities.iter().map(|e| e.samples.len()).sum()
    }
}
