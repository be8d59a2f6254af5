//! Generic API server group registry
//!
//! Holds installed API groups and their per-version resource storages. The
//! HTTP layer in [`crate::api`] routes typed requests through it.

use crate::error::InstallError;
use crate::scheme::SchemeRegistry;
use crate::storage::ResourceStorage;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Resource name to storage, for one version
pub type ResourceStorageMap = HashMap<String, Arc<dyn ResourceStorage>>;

/// Everything needed to serve one API group
pub struct ApiGroupInfo {
    pub group_name: String,
    pub scheme: Arc<SchemeRegistry>,
    /// Version to resource storages
    pub versioned_resources_storage_map: HashMap<String, ResourceStorageMap>,
}

impl ApiGroupInfo {
    /// Group info with an empty storage map
    pub fn new_default(group_name: impl Into<String>, scheme: Arc<SchemeRegistry>) -> Self {
        Self {
            group_name: group_name.into(),
            scheme,
            versioned_resources_storage_map: HashMap::new(),
        }
    }

    /// Served versions in scheme priority order
    pub fn prioritized_versions(&self) -> Vec<String> {
        self.scheme
            .prioritized_versions(&self.group_name)
            .into_iter()
            .filter(|v| self.versioned_resources_storage_map.contains_key(v))
            .collect()
    }

    /// Version a request without an explicit version resolves to
    ///
    /// Falls back to the highest priority served version when the scheme's
    /// preferred version has no storages installed.
    pub fn preferred_version(&self) -> Option<String> {
        self.scheme
            .resolve_version(&self.group_name, None)
            .filter(|v| self.versioned_resources_storage_map.contains_key(v))
            .or_else(|| self.prioritized_versions().into_iter().next())
    }

    pub fn storage(&self, version: &str, resource: &str) -> Option<Arc<dyn ResourceStorage>> {
        self.versioned_resources_storage_map
            .get(version)
            .and_then(|resources| resources.get(resource))
            .cloned()
    }

    /// Storages of one version, sorted by resource name
    pub fn resources(&self, version: &str) -> Vec<(String, Arc<dyn ResourceStorage>)> {
        let mut resources: Vec<_> = self
            .versioned_resources_storage_map
            .get(version)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        resources.sort_by(|a, b| a.0.cmp(&b.0));
        resources
    }
}

/// Installed API groups
#[derive(Default)]
pub struct GenericApiServer {
    groups: BTreeMap<String, ApiGroupInfo>,
}

impl GenericApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and install a group
    pub fn install_api_group(&mut self, info: ApiGroupInfo) -> Result<(), InstallError> {
        let group = info.group_name.clone();

        if self.groups.contains_key(&group) {
            return Err(InstallError::GroupAlreadyInstalled(group));
        }
        if info.versioned_resources_storage_map.is_empty() {
            return Err(InstallError::NoVersions(group));
        }

        for (version, resources) in &info.versioned_resources_storage_map {
            if !info.scheme.is_registered(&group, version) {
                return Err(InstallError::UnknownVersion {
                    group,
                    version: version.clone(),
                });
            }
            for resource in resources.keys() {
                if info.scheme.kind_for(&group, version, resource).is_none() {
                    return Err(InstallError::UnknownResource {
                        group,
                        version: version.clone(),
                        resource: resource.clone(),
                    });
                }
            }
        }

        info!(
            group = %group,
            versions = ?info.prioritized_versions(),
            "Installed API group"
        );
        self.groups.insert(group, info);
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&ApiGroupInfo> {
        self.groups.get(name)
    }

    /// Installed groups, sorted by name
    pub fn groups(&self) -> impl Iterator<Item = &ApiGroupInfo> {
        self.groups.values()
    }

    pub fn storage(
        &self,
        group: &str,
        version: &str,
        resource: &str,
    ) -> Option<Arc<dyn ResourceStorage>> {
        self.group(group)?.storage(version, resource)
    }
}
