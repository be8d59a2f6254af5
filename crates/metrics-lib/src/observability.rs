//! Observability infrastructure for the metrics API server
//!
//! Provides:
//! - Prometheus metrics (request latency and outcomes, sink and index sizes)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info};

/// Histogram buckets for request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ApiServerMetricsInner> = OnceLock::new();

struct ApiServerMetricsInner {
    request_latency_seconds: HistogramVec,
    requests_total: IntCounterVec,
    sink_entities: IntGauge,
    sink_samples: IntGauge,
    sink_batches_total: IntCounter,
    index_nodes: IntGauge,
    index_pods: IntGauge,
    index_refresh_errors: IntCounter,
}

impl ApiServerMetricsInner {
    fn new() -> Self {
        Self {
            request_latency_seconds: register_histogram_vec!(
                "metrics_apiserver_request_latency_seconds",
                "Time spent serving metrics API requests",
                &["resource", "verb"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            requests_total: register_int_counter_vec!(
                "metrics_apiserver_requests_total",
                "Metrics API requests by resource, verb and status code",
                &["resource", "verb", "code"]
            )
            .expect("Failed to register requests_total"),

            sink_entities: register_int_gauge!(
                "metrics_apiserver_sink_entities",
                "Entities with samples in the metrics sink"
            )
            .expect("Failed to register sink_entities"),

            sink_samples: register_int_gauge!(
                "metrics_apiserver_sink_samples",
                "Samples currently held by the metrics sink"
            )
            .expect("Failed to register sink_samples"),

            sink_batches_total: register_int_counter!(
                "metrics_apiserver_sink_batches_total",
                "Metric batches ingested into the sink"
            )
            .expect("Failed to register sink_batches_total"),

            index_nodes: register_int_gauge!(
                "metrics_apiserver_index_nodes",
                "Nodes known to the entity index"
            )
            .expect("Failed to register index_nodes"),

            index_pods: register_int_gauge!(
                "metrics_apiserver_index_pods",
                "Pods known to the entity index"
            )
            .expect("Failed to register index_pods"),

            index_refresh_errors: register_int_counter!(
                "metrics_apiserver_index_refresh_errors_total",
                "Failed entity index refreshes"
            )
            .expect("Failed to register index_refresh_errors"),
        }
    }
}

/// Handle to the global Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ApiServerMetrics {
    _private: (),
}

impl Default for ApiServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiServerMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ApiServerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ApiServerMetricsInner {
        GLOBAL_METRICS.get_or_init(ApiServerMetricsInner::new)
    }

    /// Record one served request
    pub fn observe_request(&self, resource: &str, verb: &str, code: u16, duration_secs: f64) {
        let inner = self.inner();
        let code = code.to_string();
        inner
            .request_latency_seconds
            .with_label_values(&[resource, verb])
            .observe(duration_secs);
        inner
            .requests_total
            .with_label_values(&[resource, verb, code.as_str()])
            .inc();
    }

    pub fn set_sink_size(&self, entities: i64, samples: i64) {
        self.inner().sink_entities.set(entities);
        self.inner().sink_samples.set(samples);
    }

    pub fn inc_sink_batches(&self) {
        self.inner().sink_batches_total.inc();
    }

    pub fn set_index_size(&self, nodes: i64, pods: i64) {
        self.inner().index_nodes.set(nodes);
        self.inner().index_pods.set(pods);
    }

    pub fn inc_index_refresh_errors(&self) {
        self.inner().index_refresh_errors.inc();
    }
}

/// Structured logger for server lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, entity_source: &str) {
        info!(
            event = "server_started",
            instance = %self.instance,
            server_version = %version,
            entity_source = %entity_source,
            "Metrics API server starting"
        );
    }

    pub fn log_group_installed(&self, group: &str, versions: &[String], resources: &[String]) {
        info!(
            event = "api_group_installed",
            instance = %self.instance,
            group = %group,
            versions = ?versions,
            resources = ?resources,
            "Metrics API group installed"
        );
    }

    /// Installation failures are fatal, so this is logged at error level
    pub fn log_install_failed(&self, group: &str, reason: &str) {
        error!(
            event = "api_group_install_failed",
            instance = %self.instance,
            group = %group,
            reason = %reason,
            "Error in registering group versions"
        );
    }

    pub fn log_batch_ingested(&self, entities: usize, samples: usize, updated: usize) {
        info!(
            event = "batch_ingested",
            instance = %self.instance,
            entities = entities,
            samples = samples,
            updated = updated,
            "Ingested metrics batch"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Metrics API server shutting down"
        );
    }
}
