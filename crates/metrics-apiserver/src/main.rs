//! Metrics API server
//!
//! Serves the `metrics` API group (node and pod metrics) from an in-memory
//! sink, with entity existence checked against a cluster or static index.

use anyhow::{Context, Result};
use metrics_lib::{
    api::{create_router, AppState},
    health::{components, HealthRegistry},
    index::{KubeEntityIndex, KubeIndexConfig, MemoryEntityIndex},
    install_metrics_api, install_metrics_types,
    observability::{ApiServerMetrics, StructuredLogger},
    scheme::GROUP_NAME,
    sink::MemoryMetricsSink,
    GenericApiServer, SchemeRegistry,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

use config::{EntitySource, ServerConfig};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServerConfig::load()?;
    info!(
        api_port = config.api_port,
        entity_source = config.entity_source.as_str(),
        "Metrics API server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::ENTITY_INDEX).await;
    health_registry.register(components::METRICS_SINK).await;
    health_registry.register(components::API_GROUP).await;

    let metrics = ApiServerMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(SERVER_VERSION, config.entity_source.as_str());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Scheme is frozen once shared
    let mut scheme = SchemeRegistry::new();
    install_metrics_types(&mut scheme).context("Failed to register metrics types")?;
    let scheme = Arc::new(scheme);

    let sink = Arc::new(MemoryMetricsSink::new(config.sink_max_age()));
    tokio::spawn(sink.clone().run_eviction(
        config.metric_resolution(),
        metrics.clone(),
        health_registry.clone(),
        shutdown_tx.subscribe(),
    ));

    let index = match config.entity_source {
        EntitySource::Static => {
            let path = config
                .static_entities_path
                .as_deref()
                .context("static_entities_path is not set")?;
            let index = Arc::new(MemoryEntityIndex::from_seed_file(path).await?);
            metrics.set_index_size(index.node_count().await as i64, index.pod_count().await as i64);
            index
        }
        EntitySource::Kube => {
            let client = kube::Client::try_default()
                .await
                .context("Failed to create Kubernetes client")?;
            let refresher = KubeEntityIndex::new(
                client,
                Arc::new(MemoryEntityIndex::new()),
                KubeIndexConfig {
                    resync_interval: config.index_resync_interval(),
                },
                health_registry.clone(),
                metrics.clone(),
            );

            // Serve before the first relist succeeds; entities simply 404 until then
            if let Err(e) = refresher.refresh().await {
                warn!(error = %e, "Initial entity index refresh failed");
                health_registry
                    .set_degraded(components::ENTITY_INDEX, e.to_string())
                    .await;
            }

            let index = refresher.index();
            tokio::spawn(refresher.run(shutdown_tx.subscribe()));
            index
        }
    };

    let mut server = GenericApiServer::new();
    if let Err(e) = install_metrics_api(&mut server, scheme, sink.clone(), index) {
        logger.log_install_failed(GROUP_NAME, &e.to_string());
        health_registry
            .set_unhealthy(components::API_GROUP, e.to_string())
            .await;
        return Err(e).context("Failed to install metrics API group");
    }

    if let Some(group) = server.group(GROUP_NAME) {
        let versions = group.prioritized_versions();
        let resources: Vec<String> = versions
            .iter()
            .flat_map(|v| group.resources(v))
            .map(|(resource, _)| resource)
            .collect();
        logger.log_group_installed(GROUP_NAME, &versions, &resources);
    }

    let state = Arc::new(AppState::new(
        Arc::new(server),
        sink,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));
    let api_handle = tokio::spawn(api::serve(
        config.api_port,
        create_router(state),
        shutdown_tx.subscribe(),
    ));

    health_registry.set_ready(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server exited with error"),
        Err(e) => warn!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}
