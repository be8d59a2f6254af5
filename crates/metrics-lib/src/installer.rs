//! Installation of the metrics API group

use crate::error::InstallError;
use crate::index::EntityIndex;
use crate::scheme::{SchemeRegistry, GROUP_NAME, V1ALPHA1};
use crate::server::{ApiGroupInfo, GenericApiServer, ResourceStorageMap};
use crate::sink::MetricsSink;
use crate::storage::{NodeMetricsStorage, PodMetricsStorage, ResourceStorage};
use std::sync::Arc;

/// Build the node and pod storages and install them as `metrics/v1alpha1`
///
/// A rejected group leaves the server unable to serve the metrics API;
/// callers should abort startup rather than retry.
pub fn install_metrics_api<I>(
    server: &mut GenericApiServer,
    scheme: Arc<SchemeRegistry>,
    sink: Arc<dyn MetricsSink>,
    index: Arc<I>,
) -> Result<(), InstallError>
where
    I: EntityIndex + 'static,
{
    let kind = |resource: &str| {
        scheme
            .kind_for(GROUP_NAME, V1ALPHA1, resource)
            .cloned()
            .ok_or_else(|| InstallError::UnknownResource {
                group: GROUP_NAME.to_string(),
                version: V1ALPHA1.to_string(),
                resource: resource.to_string(),
            })
    };

    let node_storage: Arc<dyn ResourceStorage> = Arc::new(NodeMetricsStorage::new(
        kind("nodes")?,
        sink.clone(),
        index.clone(),
    ));
    let pod_storage: Arc<dyn ResourceStorage> =
        Arc::new(PodMetricsStorage::new(kind("pods")?, sink, index));

    let mut resources = ResourceStorageMap::new();
    resources.insert("nodes".to_string(), node_storage);
    resources.insert("pods".to_string(), pod_storage);

    let mut info = ApiGroupInfo::new_default(GROUP_NAME, scheme.clone());
    info.versioned_resources_storage_map
        .insert(V1ALPHA1.to_string(), resources);

    server.install_api_group(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryEntityIndex;
    use crate::models::{EntityRef, Node, Pod};
    use crate::scheme::install_metrics_types;
    use crate::sink::MemoryMetricsSink;

    fn parts() -> (Arc<SchemeRegistry>, Arc<MemoryMetricsSink>, Arc<MemoryEntityIndex>) {
        let mut scheme = SchemeRegistry::new();
        install_metrics_types(&mut scheme).unwrap();
        (
            Arc::new(scheme),
            Arc::new(MemoryMetricsSink::new(chrono::Duration::minutes(5))),
            Arc::new(MemoryEntityIndex::new()),
        )
    }

    #[tokio::test]
    async fn test_installs_node_and_pod_storages() {
        let (scheme, sink, index) = parts();
        index.upsert_node(Node::new("n1")).await;
        index.upsert_pod(Pod::new("ns1", "p1")).await;

        let mut server = GenericApiServer::new();
        install_metrics_api(&mut server, scheme, sink, index).unwrap();

        let group = server.group(GROUP_NAME).unwrap();
        let names: Vec<String> = group.resources(V1ALPHA1).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["nodes", "pods"]);

        let nodes = server.storage(GROUP_NAME, V1ALPHA1, "nodes").unwrap();
        assert_eq!(nodes.kind().kind, "NodeMetrics");
        assert!(!nodes.namespaced());
        assert!(nodes.get(&EntityRef::node("n1")).await.is_ok());

        let pods = server.storage(GROUP_NAME, V1ALPHA1, "pods").unwrap();
        assert!(pods.namespaced());
        assert!(pods.get(&EntityRef::pod("ns1", "p1")).await.is_ok());
    }

    #[test]
    fn test_second_install_rejected() {
        let (scheme, sink, index) = parts();
        let mut server = GenericApiServer::new();
        install_metrics_api(&mut server, scheme.clone(), sink.clone(), index.clone()).unwrap();

        let err = install_metrics_api(&mut server, scheme, sink, index).unwrap_err();
        assert_eq!(err, InstallError::GroupAlreadyInstalled(GROUP_NAME.to_string()));
    }

    #[test]
    fn test_install_without_registered_kinds_fails() {
        let (_, sink, index) = parts();
        let mut server = GenericApiServer::new();

        let err = install_metrics_api(
            &mut server,
            Arc::new(SchemeRegistry::new()),
            sink,
            index,
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::UnknownResource { .. }));
    }
}
