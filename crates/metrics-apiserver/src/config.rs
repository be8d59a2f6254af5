//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Where the entity index gets nodes and pods from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitySource {
    /// Periodic relist against the cluster API
    Kube,
    /// JSON seed file, for clusterless deployments
    Static,
}

impl EntitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitySource::Kube => "kube",
            EntitySource::Static => "static",
        }
    }
}

/// Metrics API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port serving the API, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_entity_source")]
    pub entity_source: EntitySource,

    /// Seed file used when `entity_source` is `static`
    #[serde(default)]
    pub static_entities_path: Option<PathBuf>,

    /// Seconds between cluster relists
    #[serde(default = "default_index_resync")]
    pub index_resync_secs: u64,

    /// Samples older than this are treated as absent
    #[serde(default = "default_sink_max_age")]
    pub sink_max_age_secs: u64,

    /// Period of the sink eviction sweep
    #[serde(default = "default_metric_resolution")]
    pub metric_resolution_secs: u64,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "metrics-apiserver".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_entity_source() -> EntitySource {
    EntitySource::Kube
}

fn default_index_resync() -> u64 {
    30
}

fn default_sink_max_age() -> u64 {
    300
}

fn default_metric_resolution() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            api_port: default_api_port(),
            entity_source: default_entity_source(),
            static_entities_path: None,
            index_resync_secs: default_index_resync(),
            sink_max_age_secs: default_sink_max_age(),
            metric_resolution_secs: default_metric_resolution(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `METRICS_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("METRICS"))
            .build()?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let config: ServerConfig = config
            .try_deserialize()
            .context("Invalid metrics server configuration")?;

        if config.entity_source == EntitySource::Static && config.static_entities_path.is_none() {
            anyhow::bail!("static_entities_path is required when entity_source is static");
        }

        Ok(config)
    }

    pub fn index_resync_interval(&self) -> Duration {
        Duration::from_secs(self.index_resync_secs)
    }

    pub fn sink_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sink_max_age_secs as i64)
    }

    pub fn metric_resolution(&self) -> Duration {
        Duration::from_secs(self.metric_resolution_secs.max(1))
    }
}
