//! Error types for scheme registration, group installation and storage lookups

use crate::models::EntityRef;
use thiserror::Error;

/// Startup-time registration conflicts in the [`SchemeRegistry`](crate::scheme::SchemeRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("kind {kind} is already registered in {group}/{version}")]
    DuplicateKind {
        group: String,
        version: String,
        kind: String,
    },

    #[error("resource {resource} is already registered in {group}/{version}")]
    DuplicateResource {
        group: String,
        version: String,
        resource: String,
    },

    #[error("version {version} was never registered in group {group}")]
    UnregisteredVersion { group: String, version: String },

    #[error("version {version} is listed more than once for group {group}")]
    DuplicatePriority { group: String, version: String },

    #[error("empty version priority for group {0}")]
    EmptyPriority(String),
}

/// The generic server rejected an API group
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("API group {0} is already installed")]
    GroupAlreadyInstalled(String),

    #[error("API group {0} has no versioned resources")]
    NoVersions(String),

    #[error("version {version} of group {group} is not registered in the scheme")]
    UnknownVersion { group: String, version: String },

    #[error("resource {resource} has no registered kind in {group}/{version}")]
    UnknownResource {
        group: String,
        version: String,
        resource: String,
    },
}

/// Request-time failures surfaced by a resource storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(EntityRef),

    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a [`MetricsSink`](crate::sink::MetricsSink)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Unreachable(String),
}

impl From<SinkError> for StorageError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Unreachable(reason) => StorageError::Unavailable(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid label selector {selector:?}: {reason}")]
pub struct SelectorParseError {
    pub selector: String,
    pub reason: String,
}
