//! In-memory metrics sink
//!
//! Keeps only the newest batch per entity:
//! - a batch replaces the entity's previous samples wholesale
//! - batches older than what is already stored are ignored
//! - samples older than `max_age` are treated as absent and evicted on read

use super::{async_trait, MetricsBatch, MetricsSink};
use crate::error::SinkError;
use crate::health::{components, HealthRegistry};
use crate::models::{EntityRef, MetricSample};
use crate::observability::ApiServerMetrics;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct StoredSamples {
    batch_timestamp: DateTime<Utc>,
    samples: Vec<MetricSample>,
}

/// Sink statistics for gauges and debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub entities: usize,
    pub samples: usize,
    pub batches_ingested: u64,
}

pub struct MemoryMetricsSink {
    latest: DashMap<EntityRef, StoredSamples>,
    max_age: Duration,
    reachable: AtomicBool,
    batches_ingested: AtomicU64,
}

impl MemoryMetricsSink {
    pub fn new(max_age: Duration) -> Self {
        Self {
            latest: DashMap::new(),
            max_age,
            reachable: AtomicBool::new(true),
            batches_ingested: AtomicU64::new(0),
        }
    }

    /// Store a batch; returns the number of entities updated
    pub fn ingest(&self, batch: MetricsBatch) -> usize {
        let mut updated = 0;

        for entry in batch.entities {
            let stored = StoredSamples {
                batch_timestamp: batch.timestamp,
                samples: entry.samples,
            };

            // Compare and replace under the shard lock
            match self.latest.entry(entry.entity) {
                Entry::Occupied(mut current) => {
                    if current.get().batch_timestamp > batch.timestamp {
                        debug!(entity = %current.key(), "Ignoring out-of-order batch");
                        continue;
                    }
                    current.insert(stored);
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(stored);
                }
            }
            updated += 1;
        }

        self.batches_ingested.fetch_add(1, Ordering::Relaxed);
        updated
    }

    /// Drop everything older than `max_age` relative to `now`
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.latest.len();
        self.latest
            .retain(|_, stored| now - stored.batch_timestamp <= self.max_age);
        before - self.latest.len()
    }

    /// Mark the sink as (un)reachable; reads fail while unreachable
    pub fn set_reachable(&self, reachable: bool) {
        if !reachable {
            warn!("Metrics sink marked unreachable");
        }
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Reflect reachability in the sink's health component
    pub async fn report_health(&self, health: &HealthRegistry) {
        if self.is_reachable() {
            health.set_healthy(components::METRICS_SINK).await;
        } else {
            health
                .set_degraded(components::METRICS_SINK, "metrics sink unreachable")
                .await;
        }
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            entities: self.latest.len(),
            samples: self.latest.iter().map(|e| e.samples.len()).sum(),
            batches_ingested: self.batches_ingested.load(Ordering::Relaxed),
        }
    }

    /// Evict expired entries and report health every `period` until
    /// `shutdown` fires
    pub async fn run_eviction(
        self: Arc<Self>,
        period: std::time::Duration,
        metrics: ApiServerMetrics,
        health: HealthRegistry,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(period_secs = period.as_secs(), "Starting sink eviction loop");
        let mut ticker = interval(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.evict_expired(Utc::now());
                    let stats = self.stats();
                    metrics.set_sink_size(stats.entities as i64, stats.samples as i64);
                    self.report_health(&health).await;
                    if evicted > 0 {
                        debug!(evicted, remaining = stats.entities, "Evicted expired samples");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down sink eviction loop");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl MetricsSink for MemoryMetricsSink {
    async fn latest_samples(&self, entity: &EntityRef) -> Result<Vec<MetricSample>, SinkError> {
        if !self.is_reachable() {
            return Err(SinkError::Unreachable("in-memory sink is offline".to_string()));
        }

        let now = Utc::now();
        if let Some(stored) = self.latest.get(entity) {
            if now - stored.batch_timestamp <= self.max_age {
                return Ok(stored.samples.clone());
            }
        }

        // A fresh batch may have landed since the read above
        if self
            .latest
            .remove_if(entity, |_, stored| now - stored.batch_timestamp > self.max_age)
            .is_some()
        {
            debug!(entity = %entity, "Evicted stale samples");
            return Ok(Vec::new());
        }

        Ok(self
            .latest
            .get(entity)
            .map(|stored| stored.samples.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::models::Quantity;
    use crate::sink::EntityMetrics;

    fn batch(timestamp: DateTime<Utc>, entity: EntityRef, cpu: f64) -> MetricsBatch {
        MetricsBatch {
            timestamp,
            entities: vec![EntityMetrics {
                entity,
                samples: vec![
                    MetricSample::new("cpu", Quantity::new(cpu, ""), timestamp),
                    MetricSample::new("memory", Quantity::new(200.0, "Mi"), timestamp),
                ],
            }],
        }
    }

    #[tokio::test]
    async fn test_latest_batch_wins() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let now = Utc::now();
        let n1 = EntityRef::node("n1");

        sink.ingest(batch(now - Duration::seconds(30), n1.clone(), 0.2));
        sink.ingest(batch(now, n1.clone(), 0.5));

        let samples = sink.latest_samples(&n1).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name, "cpu");
        assert_eq!(samples[0].quantity.value, 0.5);
        assert_eq!(samples[1].name, "memory");
    }

    #[tokio::test]
    async fn test_out_of_order_batch_ignored() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let now = Utc::now();
        let n1 = EntityRef::node("n1");

        sink.ingest(batch(now, n1.clone(), 0.5));
        let updated = sink.ingest(batch(now - Duration::seconds(30), n1.clone(), 0.2));

        assert_eq!(updated, 0);
        let samples = sink.latest_samples(&n1).await.unwrap();
        assert_eq!(samples[0].quantity.value, 0.5);
    }

    #[tokio::test]
    async fn test_unknown_entity_is_empty() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let samples = sink.latest_samples(&EntityRef::pod("ns1", "p1")).await.unwrap();
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_stale_samples_are_dropped() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let n1 = EntityRef::node("n1");
        sink.ingest(batch(Utc::now() - Duration::minutes(10), n1.clone(), 0.5));

        assert!(sink.latest_samples(&n1).await.unwrap().is_empty());
        assert_eq!(sink.stats().entities, 0);
    }

    #[tokio::test]
    async fn test_unreachable_sink_fails_reads() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        sink.set_reachable(false);

        let err = sink.latest_samples(&EntityRef::node("n1")).await.unwrap_err();
        assert!(matches!(err, SinkError::Unreachable(_)));

        sink.set_reachable(true);
        assert!(sink.latest_samples(&EntityRef::node("n1")).await.is_ok());
    }

    #[test]
    fn test_evict_expired_and_stats() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let now = Utc::now();
        sink.ingest(batch(now, EntityRef::node("fresh"), 0.1));
        sink.ingest(batch(now - Duration::minutes(6), EntityRef::node("stale"), 0.1));

        assert_eq!(
            sink.stats(),
            SinkStats {
                entities: 2,
                samples: 4,
                batches_ingested: 2,
            }
        );
        assert_eq!(sink.evict_expired(now), 1);
        assert_eq!(sink.stats().entities, 1);
    }

    #[tokio::test]
    async fn test_eviction_loop_sweeps_until_shutdown() {
        let sink = Arc::new(MemoryMetricsSink::new(Duration::minutes(5)));
        let now = Utc::now();
        sink.ingest(batch(now, EntityRef::node("fresh"), 0.1));
        sink.ingest(batch(now - Duration::minutes(6), EntityRef::node("stale"), 0.1));

        let health = HealthRegistry::new();
        sink.set_reachable(false);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(sink.clone().run_eviction(
            std::time::Duration::from_millis(10),
            ApiServerMetrics::new(),
            health.clone(),
            rx,
        ));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(sink.stats().entities, 1);
        let status = health.health().await;
        assert_eq!(
            status.components[components::METRICS_SINK].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_health_follows_reachability() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let health = HealthRegistry::new();

        sink.set_reachable(false);
        sink.report_health(&health).await;
        let response = health.health().await;
        let component = &response.components[components::METRICS_SINK];
        assert_eq!(component.status, ComponentStatus::Degraded);
        assert_eq!(component.message.as_deref(), Some("metrics sink unreachable"));

        sink.set_reachable(true);
        sink.report_health(&health).await;
        assert_eq!(
            health.health().await.components[components::METRICS_SINK].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_stale_read_keeps_fresh_replacement() {
        let sink = MemoryMetricsSink::new(Duration::minutes(5));
        let n1 = EntityRef::node("n1");
        let now = Utc::now();

        sink.ingest(batch(now - Duration::minutes(10), n1.clone(), 0.1));
        sink.ingest(batch(now, n1.clone(), 0.7));

        let samples = sink.latest_samples(&n1).await.unwrap();
        assert_eq!(samples[0].quantity.value, 0.7);
        assert_eq!(sink.stats().entities, 1);
    }

    #[test]
    fn test_concurrent_ingest_keeps_newest_batch() {
        use std::sync::Barrier;

        let now = Utc::now();
        let n1 = EntityRef::node("n1");

        for _ in 0..200 {
            let sink = Arc::new(MemoryMetricsSink::new(Duration::minutes(5)));
            let barrier = Arc::new(Barrier::new(2));

            let writers: Vec<_> = [(now - Duration::seconds(30), 0.2), (now, 0.9)]
                .into_iter()
                .map(|(timestamp, cpu)| {
                    let sink = sink.clone();
                    let barrier = barrier.clone();
                    let n1 = n1.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        sink.ingest(batch(timestamp, n1, cpu));
                    })
                })
                .collect();

            for writer in writers {
                writer.join().unwrap();
            }

            let stored = sink.latest.get(&n1).unwrap();
            assert_eq!(stored.batch_timestamp, now);
            assert_eq!(stored.samples[0].quantity.value, 0.9);
        }
    }
}
