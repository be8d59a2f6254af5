//! API client for the metrics API server

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// API group served by the metrics API server
pub const METRICS_GROUP: &str = "metrics";

/// Failure reported by the server as a `Status` object
#[derive(Debug, Error)]
#[error("{message} ({reason}, {code})")]
pub struct StatusError {
    pub code: u16,
    pub reason: String,
    pub message: String,
}

impl StatusError {
    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }
}

/// API client for the metrics API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid server URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<Status>(&body) {
                Ok(status) => StatusError {
                    code,
                    reason: status.reason,
                    message: status.message,
                }
                .into(),
                Err(_) => anyhow::anyhow!("API error ({}): {}", code, body),
            });
        }

        response.json().await.context("Failed to parse response")
    }

    /// Preferred version of the metrics group, from discovery
    pub async fn preferred_version(&self) -> Result<String> {
        let group: ApiGroup = self
            .get(&format!("apis/{}", METRICS_GROUP), &[])
            .await
            .context("Failed to discover the metrics API group")?;

        group
            .preferred_version
            .or_else(|| group.versions.into_iter().next())
            .map(|v| v.version)
            .context("Metrics API group advertises no versions")
    }

    pub async fn node_metrics(&self, version: &str, name: &str) -> Result<MetricsItem> {
        let path = format!("apis/{}/{}/nodes/{}", METRICS_GROUP, version, name);
        self.get(&path, &[]).await
    }

    pub async fn list_node_metrics(
        &self,
        version: &str,
        selector: Option<&str>,
    ) -> Result<MetricsItemList> {
        let path = format!("apis/{}/{}/nodes", METRICS_GROUP, version);
        self.get(&path, &selector_query(selector)).await
    }

    pub async fn pod_metrics(&self, version: &str, namespace: &str, name: &str) -> Result<MetricsItem> {
        let path = format!(
            "apis/{}/{}/namespaces/{}/pods/{}",
            METRICS_GROUP, version, namespace, name
        );
        self.get(&path, &[]).await
    }

    /// List pod metrics in `namespace`, or across all namespaces when `None`
    pub async fn list_pod_metrics(
        &self,
        version: &str,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<MetricsItemList> {
        let path = match namespace {
            Some(ns) => format!("apis/{}/{}/namespaces/{}/pods", METRICS_GROUP, version, ns),
            None => format!("apis/{}/{}/pods", METRICS_GROUP, version),
        };
        self.get(&path, &selector_query(selector)).await
    }
}

fn selector_query(selector: Option<&str>) -> Vec<(&str, &str)> {
    selector
        .map(|s| vec![("labelSelector", s)])
        .unwrap_or_default()
}

// API response types

#[derive(Debug, Clone, Deserialize)]
struct Status {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupVersion {
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiGroup {
    #[serde(default)]
    pub versions: Vec<GroupVersion>,
    #[serde(rename = "preferredVersion")]
    pub preferred_version: Option<GroupVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub quantity: Quantity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsItem {
    pub kind: String,
    pub metadata: ObjectMeta,
    pub window: Window,
    pub samples: Vec<Sample>,
}

impl MetricsItem {
    pub fn sample(&self, name: &str) -> Option<&Quantity> {
        self.samples
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsItemList {
    pub kind: String,
    pub items: Vec<MetricsItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const NODE_N1: &str = r#"{
        "apiVersion": "metrics/v1alpha1",
        "kind": "NodeMetrics",
        "metadata": {"name": "n1"},
        "window": {"start": "2024-01-01T00:00:00Z", "end": "2024-01-01T00:00:00Z"},
        "samples": [
            {"name": "cpu", "quantity": {"value": 0.5}, "timestamp": "2024-01-01T00:00:00Z"},
            {"name": "memory", "quantity": {"value": 200.0, "unit": "Mi"}, "timestamp": "2024-01-01T00:00:00Z"}
        ]
    }"#;

    #[tokio::test]
    async fn test_get_node_metrics() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/apis/metrics/v1alpha1/nodes/n1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(NODE_N1)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let item = client.node_metrics("v1alpha1", "n1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(item.metadata.name, "n1");
        assert_eq!(item.sample("cpu").map(|q| q.value), Some(0.5));
        assert_eq!(item.sample("memory").map(|q| q.unit.as_str()), Some("Mi"));
    }

    #[tokio::test]
    async fn test_list_pods_sends_selector() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/apis/metrics/v1alpha1/namespaces/ns1/pods")
            .match_query(Matcher::UrlEncoded(
                "labelSelector".into(),
                "app=web".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"apiVersion": "metrics/v1alpha1", "kind": "PodMetricsList", "items": []}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let list = client
            .list_pod_metrics("v1alpha1", Some("ns1"), Some("app=web"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(list.items.is_empty());
    }

    #[tokio::test]
    async fn test_status_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apis/metrics/v1alpha1/namespaces/ns1/pods/ghost")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"kind": "Status", "apiVersion": "v1", "status": "Failure",
                    "message": "pod ns1/ghost not found", "reason": "NotFound", "code": 404}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .pod_metrics("v1alpha1", "ns1", "ghost")
            .await
            .unwrap_err();

        let status = err.downcast_ref::<StatusError>().unwrap();
        assert!(status.is_not_found());
        assert_eq!(status.message, "pod ns1/ghost not found");
    }

    #[tokio::test]
    async fn test_preferred_version_from_discovery() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apis/metrics")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"kind": "APIGroup", "apiVersion": "v1", "name": "metrics",
                    "versions": [{"groupVersion": "metrics/v1beta1", "version": "v1beta1"},
                                 {"groupVersion": "metrics/v1alpha1", "version": "v1alpha1"}],
                    "preferredVersion": {"groupVersion": "metrics/v1beta1", "version": "v1beta1"}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert_eq!(client.preferred_version().await.unwrap(), "v1beta1");
    }
}
