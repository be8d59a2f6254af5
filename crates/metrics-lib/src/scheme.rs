//! Type scheme: registered resource kinds and per-group version priority
//!
//! The registry is populated once at startup and then moved behind an `Arc`
//! when the API group is installed, which leaves it read-only for the
//! lifetime of the server.

use crate::error::ConfigurationError;
use serde::Serialize;
use std::collections::HashMap;

/// Name of the metrics API group
pub const GROUP_NAME: &str = "metrics";

/// Served version of the metrics API group
pub const V1ALPHA1: &str = "v1alpha1";

/// A registrable group/version/kind together with its plural resource name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceKind {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub resource: String,
    pub namespaced: bool,
}

impl ResourceKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        resource: impl Into<String>,
        namespaced: bool,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            resource: resource.into(),
            namespaced,
        }
    }

    pub fn node_metrics(version: &str) -> Self {
        Self::new(GROUP_NAME, version, "NodeMetrics", "nodes", false)
    }

    pub fn pod_metrics(version: &str) -> Self {
        Self::new(GROUP_NAME, version, "PodMetrics", "pods", true)
    }

    /// `group/version` as used in the `apiVersion` field
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    pub fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }
}

/// Registry of known kinds and version priorities
#[derive(Debug, Default)]
pub struct SchemeRegistry {
    kinds: Vec<ResourceKind>,
    priorities: HashMap<String, Vec<String>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind; fails if the same group/version already has the kind
    /// or the plural resource name
    pub fn register(&mut self, kind: ResourceKind) -> Result<(), ConfigurationError> {
        let same_kind = self
            .versioned(&kind.group, &kind.version)
            .any(|existing| existing.kind == kind.kind);
        if same_kind {
            return Err(ConfigurationError::DuplicateKind {
                group: kind.group,
                version: kind.version,
                kind: kind.kind,
            });
        }

        let same_resource = self
            .versioned(&kind.group, &kind.version)
            .any(|existing| existing.resource == kind.resource);
        if same_resource {
            return Err(ConfigurationError::DuplicateResource {
                group: kind.group,
                version: kind.version,
                resource: kind.resource,
            });
        }

        tracing::debug!(
            group = %kind.group,
            version = %kind.version,
            kind = %kind.kind,
            "Registered kind"
        );
        self.kinds.push(kind);
        Ok(())
    }

    /// Set the version order for a group, highest priority first
    pub fn set_version_priority(
        &mut self,
        group: &str,
        versions: &[&str],
    ) -> Result<(), ConfigurationError> {
        if versions.is_empty() {
            return Err(ConfigurationError::EmptyPriority(group.to_string()));
        }

        let registered = self.registered_versions(group);
        let mut ordered: Vec<String> = Vec::with_capacity(versions.len());
        for version in versions {
            if !registered.iter().any(|v| v == version) {
                return Err(ConfigurationError::UnregisteredVersion {
                    group: group.to_string(),
                    version: version.to_string(),
                });
            }
            if ordered.iter().any(|v| v == version) {
                return Err(ConfigurationError::DuplicatePriority {
                    group: group.to_string(),
                    version: version.to_string(),
                });
            }
            ordered.push(version.to_string());
        }

        self.priorities.insert(group.to_string(), ordered);
        Ok(())
    }

    /// All versions of a group in priority order
    ///
    /// Versions named in the priority list come first; registered versions
    /// missing from it follow in registration order.
    pub fn prioritized_versions(&self, group: &str) -> Vec<String> {
        let mut versions = self.priorities.get(group).cloned().unwrap_or_default();
        for version in self.registered_versions(group) {
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
        versions
    }

    pub fn preferred_version(&self, group: &str) -> Option<String> {
        self.prioritized_versions(group).into_iter().next()
    }

    /// Resolve a possibly omitted version to a registered one
    pub fn resolve_version(&self, group: &str, requested: Option<&str>) -> Option<String> {
        match requested {
            Some(version) => self
                .registered_versions(group)
                .into_iter()
                .find(|v| v == version),
            None => self.preferred_version(group),
        }
    }

    /// Whether any kind is registered under `group/version`
    pub fn is_registered(&self, group: &str, version: &str) -> bool {
        self.versioned(group, version).next().is_some()
    }

    /// Kind serving `resource` in `group/version`
    pub fn kind_for(&self, group: &str, version: &str, resource: &str) -> Option<&ResourceKind> {
        self.kinds
            .iter()
            .find(|k| k.group == group && k.version == version && k.resource == resource)
    }

    pub fn kinds(&self, group: &str, version: &str) -> Vec<&ResourceKind> {
        self.kinds
            .iter()
            .filter(|k| k.group == group && k.version == version)
            .collect()
    }

    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for kind in &self.kinds {
            if !groups.contains(&kind.group) {
                groups.push(kind.group.clone());
            }
        }
        groups
    }

    fn registered_versions(&self, group: &str) -> Vec<String> {
        let mut versions: Vec<String> = Vec::new();
        for kind in self.kinds.iter().filter(|k| k.group == group) {
            if !versions.contains(&kind.version) {
                versions.push(kind.version.clone());
            }
        }
        versions
    }

    fn versioned<'a>(
        &'a self,
        group: &'a str,
        version: &'a str,
    ) -> impl Iterator<Item = &'a ResourceKind> + 'a {
        self.kinds
            .iter()
            .filter(move |k| k.group == group && k.version == version)
    }
}

/// Register the metrics kinds and make `v1alpha1` the preferred version
pub fn install_metrics_types(scheme: &mut SchemeRegistry) -> Result<(), ConfigurationError> {
    scheme.register(ResourceKind::node_metrics(V1ALPHA1))?;
    scheme.register(ResourceKind::pod_metrics(V1ALPHA1))?;
    scheme.set_version_priority(GROUP_NAME, &[V1ALPHA1])?;
    Ok(())
}
