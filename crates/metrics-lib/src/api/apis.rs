//! Routing of `/apis/...` requests into installed resource storages
//!
//! Supported paths, below `/apis`:
//! - `{group}` and `{group}/{version}` for discovery
//! - `{group}/{version}/{resource}[/{name}]` for cluster-wide list and get
//! - `{group}/{version}/namespaces/{ns}/{resource}[/{name}]` for namespaced ones

use super::status::ApiError;
use super::AppState;
use crate::models::EntityRef;
use crate::selector::LabelSelector;
use crate::server::{ApiGroupInfo, GenericApiServer};
use crate::storage::ListOptions;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

/// Query parameters accepted on list requests
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "labelSelector")]
    pub label_selector: Option<String>,
}

/// Parsed request target
#[derive(Debug, PartialEq, Eq)]
enum ApiTarget<'a> {
    Group(&'a str),
    Version(&'a str, &'a str),
    List {
        group: &'a str,
        version: &'a str,
        resource: &'a str,
        namespace: Option<&'a str>,
    },
    Get {
        group: &'a str,
        version: &'a str,
        resource: &'a str,
        namespace: Option<&'a str>,
        name: &'a str,
    },
    Invalid,
}

impl<'a> ApiTarget<'a> {
    fn parse(path: &'a str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match *segments.as_slice() {
            [group] => ApiTarget::Group(group),
            [group, version] => ApiTarget::Version(group, version),
            [group, version, "namespaces", namespace, resource] => ApiTarget::List {
                group,
                version,
                resource,
                namespace: Some(namespace),
            },
            [group, version, "namespaces", namespace, resource, name] => ApiTarget::Get {
                group,
                version,
                resource,
                namespace: Some(namespace),
                name,
            },
            [group, version, resource] => ApiTarget::List {
                group,
                version,
                resource,
                namespace: None,
            },
            [group, version, resource, name] => ApiTarget::Get {
                group,
                version,
                resource,
                namespace: None,
                name,
            },
            _ => ApiTarget::Invalid,
        }
    }

    /// `(resource, verb)` labels for request metrics
    ///
    /// The resource label only takes values of installed storages so that
    /// arbitrary paths cannot grow the label set.
    fn labels(&self, server: &GenericApiServer) -> (String, &'static str) {
        let installed = |group: &str, version: &str, resource: &str| {
            server
                .storage(group, version, resource)
                .map(|storage| storage.kind().resource.clone())
                .unwrap_or_else(|| UNRESOLVED_RESOURCE.to_string())
        };

        match *self {
            ApiTarget::List {
                group,
                version,
                resource,
                ..
            } => (installed(group, version, resource), "list"),
            ApiTarget::Get {
                group,
                version,
                resource,
                ..
            } => (installed(group, version, resource), "get"),
            ApiTarget::Group(_) | ApiTarget::Version(..) => ("discovery".to_string(), "get"),
            ApiTarget::Invalid => (UNRESOLVED_RESOURCE.to_string(), "get"),
        }
    }
}

/// Metric label for requests that match no installed storage
const UNRESOLVED_RESOURCE: &str = "unknown";

#[derive(Debug, Serialize)]
struct GroupVersionForDiscovery {
    #[serde(rename = "groupVersion")]
    group_version: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ApiGroup {
    kind: &'static str,
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    name: String,
    versions: Vec<GroupVersionForDiscovery>,
    #[serde(rename = "preferredVersion", skip_serializing_if = "Option::is_none")]
    preferred_version: Option<GroupVersionForDiscovery>,
}

impl ApiGroup {
    fn describe(info: &ApiGroupInfo) -> Self {
        let entry = |version: String| GroupVersionForDiscovery {
            group_version: format!("{}/{}", info.group_name, version),
            version,
        };

        Self {
            kind: "APIGroup",
            api_version: "v1",
            name: info.group_name.clone(),
            versions: info.prioritized_versions().into_iter().map(entry).collect(),
            preferred_version: info.preferred_version().map(entry),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiGroupList {
    kind: &'static str,
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    groups: Vec<ApiGroup>,
}

#[derive(Debug, Serialize)]
struct ApiResource {
    name: String,
    kind: String,
    namespaced: bool,
    verbs: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct ApiResourceList {
    kind: &'static str,
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    #[serde(rename = "groupVersion")]
    group_version: String,
    resources: Vec<ApiResource>,
}

/// `GET /apis`
pub async fn list_groups(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiGroupList {
        kind: "APIGroupList",
        api_version: "v1",
        groups: state.server.groups().map(ApiGroup::describe).collect(),
    })
}

/// `GET /apis/*path`
pub async fn serve(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let start = Instant::now();
    let target = ApiTarget::parse(&path);
    let (resource, verb) = target.labels(&state.server);

    let response = match dispatch(&state.server, &target, &path, &query).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    state.metrics.observe_request(
        &resource,
        verb,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

async fn dispatch(
    server: &GenericApiServer,
    target: &ApiTarget<'_>,
    path: &str,
    query: &ListQuery,
) -> Result<Response, ApiError> {
    let unknown = || ApiError::UnknownResource(format!("/apis/{}", path.trim_matches('/')));

    match *target {
        ApiTarget::Group(group) => {
            let info = server.group(group).ok_or_else(unknown)?;
            Ok(Json(ApiGroup::describe(info)).into_response())
        }
        ApiTarget::Version(group, version) => {
            let info = server.group(group).ok_or_else(unknown)?;
            let resources = info.resources(version);
            if resources.is_empty() {
                return Err(unknown());
            }

            Ok(Json(ApiResourceList {
                kind: "APIResourceList",
                api_version: "v1",
                group_version: format!("{}/{}", group, version),
                resources: resources
                    .into_iter()
                    .map(|(name, storage)| ApiResource {
                        name,
                        kind: storage.kind().kind.clone(),
                        namespaced: storage.namespaced(),
                        verbs: vec!["get", "list"],
                    })
                    .collect(),
            })
            .into_response())
        }
        ApiTarget::List {
            group,
            version,
            resource,
            namespace,
        } => {
            let storage = server
                .storage(group, version, resource)
                .ok_or_else(unknown)?;
            if namespace.is_some() && !storage.namespaced() {
                return Err(unknown());
            }

            let label_selector = query
                .label_selector
                .as_deref()
                .map(str::parse::<LabelSelector>)
                .transpose()?;
            let options = ListOptions {
                namespace: namespace.map(str::to_string),
                label_selector,
            };

            let list = storage.list(&options).await?;
            Ok(Json(list).into_response())
        }
        ApiTarget::Get {
            group,
            version,
            resource,
            namespace,
            name,
        } => {
            let storage = server
                .storage(group, version, resource)
                .ok_or_else(unknown)?;

            let entity = match (storage.namespaced(), namespace) {
                (true, Some(namespace)) => EntityRef::pod(namespace, name),
                (false, None) => EntityRef::node(name),
                _ => return Err(unknown()),
            };

            let metrics = storage.get(&entity).await?;
            Ok(Json(metrics).into_response())
        }
        ApiTarget::Invalid => Err(unknown()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryEntityIndex;
    use crate::installer::install_metrics_api;
    use crate::scheme::{install_metrics_types, SchemeRegistry};
    use crate::sink::MemoryMetricsSink;

    #[test]
    fn test_parse_targets() {
        assert_eq!(ApiTarget::parse("metrics"), ApiTarget::Group("metrics"));
        assert_eq!(
            ApiTarget::parse("metrics/v1alpha1/"),
            ApiTarget::Version("metrics", "v1alpha1")
        );
        assert_eq!(
            ApiTarget::parse("metrics/v1alpha1/nodes/n1"),
            ApiTarget::Get {
                group: "metrics",
                version: "v1alpha1",
                resource: "nodes",
                namespace: None,
                name: "n1",
            }
        );
        assert_eq!(
            ApiTarget::parse("metrics/v1alpha1/namespaces/ns1/pods"),
            ApiTarget::List {
                group: "metrics",
                version: "v1alpha1",
                resource: "pods",
                namespace: Some("ns1"),
            }
        );
        assert_eq!(
            ApiTarget::parse("metrics/v1alpha1/namespaces/ns1/pods/p1"),
            ApiTarget::Get {
                group: "metrics",
                version: "v1alpha1",
                resource: "pods",
                namespace: Some("ns1"),
                name: "p1",
            }
        );
        assert_eq!(ApiTarget::parse(""), ApiTarget::Invalid);
        assert_eq!(ApiTarget::parse("a/b/c/d/e/f/g"), ApiTarget::Invalid);
    }

    fn metrics_server() -> GenericApiServer {
        let mut scheme = SchemeRegistry::new();
        install_metrics_types(&mut scheme).unwrap();

        let mut server = GenericApiServer::new();
        install_metrics_api(
            &mut server,
            Arc::new(scheme),
            Arc::new(MemoryMetricsSink::new(chrono::Duration::minutes(5))),
            Arc::new(MemoryEntityIndex::new()),
        )
        .unwrap();
        server
    }

    fn labels(server: &GenericApiServer, path: &str) -> (String, &'static str) {
        ApiTarget::parse(path).labels(server)
    }

    #[test]
    fn test_metric_labels() {
        let server = metrics_server();

        assert_eq!(labels(&server, "metrics/v1alpha1/pods"), ("pods".to_string(), "list"));
        assert_eq!(
            labels(&server, "metrics/v1alpha1/namespaces/ns1/pods/p1"),
            ("pods".to_string(), "get")
        );
        assert_eq!(labels(&server, "metrics/v1alpha1/nodes/n1"), ("nodes".to_string(), "get"));
        assert_eq!(labels(&server, "metrics"), ("discovery".to_string(), "get"));
    }

    #[test]
    fn test_unresolved_paths_share_one_label() {
        let server = metrics_server();

        let resources: std::collections::HashSet<String> = (0..50)
            .map(|i| labels(&server, &format!("bogus/v9/junk{}", i)).0)
            .chain([
                labels(&server, "metrics/v1alpha1/services").0,
                labels(&server, "metrics/v2/nodes/n1").0,
                labels(&server, "a/b/c/d/e/f/g").0,
            ])
            .collect();

        assert_eq!(resources.len(), 1);
        assert!(resources.contains(UNRESOLVED_RESOURCE));
    }
}
