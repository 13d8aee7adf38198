//! # Errors
//!
//! Error type shared by every stage of a deployment run.
//!
//! Every variant except [`DeployError::UnknownKind`] aborts the run. The kind
//! tag and the rendered message are what the task result carries back to the
//! pipeline, see [`crate::deploy::task::RunFailure`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while loading, authorizing, labeling or applying manifests
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid manifest {source_name}: {message}")]
    InvalidManifest {
        source_name: String,
        message: String,
    },

    #[error("no resource binding for {api_version}/{kind}, skipped")]
    UnknownKind { api_version: String, kind: String },

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("governance validation failed for {kind} '{name}': {message}")]
    GovernanceValidation {
        kind: String,
        name: String,
        message: String,
    },

    #[error("invalid secret name '{name}': {message}")]
    InvalidName { name: String, message: String },

    #[error("cluster API {operation} failed for {kind} '{name}': {message}")]
    ClusterApi {
        operation: &'static str,
        kind: String,
        name: String,
        message: String,
    },

    #[error("resource registry initialization failed: {0}")]
    Registry(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment interrupted")]
    Interrupted,
}

/// Error classification carried across the run boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployErrorKind {
    InvalidManifest,
    UnknownKind,
    Authorization,
    GovernanceValidation,
    InvalidName,
    ClusterApi,
    Registry,
    Configuration,
    Io,
    Interrupted,
}

impl DeployErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployErrorKind::InvalidManifest => "InvalidManifestError",
            DeployErrorKind::UnknownKind => "UnknownKindWarning",
            DeployErrorKind::Authorization => "AuthorizationError",
            DeployErrorKind::GovernanceValidation => "GovernanceValidationError",
            DeployErrorKind::InvalidName => "InvalidNameError",
            DeployErrorKind::ClusterApi => "ClusterAPIError",
            DeployErrorKind::Registry => "RegistryError",
            DeployErrorKind::Configuration => "ConfigurationError",
            DeployErrorKind::Io => "IoError",
            DeployErrorKind::Interrupted => "Interrupted",
        }
    }
}

impl fmt::Display for DeployErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeployError {
    /// Classification tag for this error
    #[must_use]
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::InvalidManifest { .. } => DeployErrorKind::InvalidManifest,
            DeployError::UnknownKind { .. } => DeployErrorKind::UnknownKind,
            DeployError::Authorization(_) => DeployErrorKind::Authorization,
            DeployError::GovernanceValidation { .. } => DeployErrorKind::GovernanceValidation,
            DeployError::InvalidName { .. } => DeployErrorKind::InvalidName,
            DeployError::ClusterApi { .. } => DeployErrorKind::ClusterApi,
            DeployError::Registry(_) => DeployErrorKind::Registry,
            DeployError::Configuration(_) => DeployErrorKind::Configuration,
            DeployError::Io { .. } => DeployErrorKind::Io,
            DeployError::Interrupted => DeployErrorKind::Interrupted,
        }
    }

    /// Whether this error aborts the remaining resources of the run
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DeployError::UnknownKind { .. })
    }

    pub(crate) fn invalid_manifest(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        DeployError::InvalidManifest {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn governance(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DeployError::GovernanceValidation {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn cluster_api(
        operation: &'static str,
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        DeployError::ClusterApi {
            operation,
            kind: kind.into(),
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unknown_kind_is_non_fatal() {
        let unknown = DeployError::UnknownKind {
            api_version: "example.com/v1".to_string(),
            kind: "Widget".to_string(),
        };
        assert!(!unknown.is_fatal());
        assert!(DeployError::Authorization("nope".to_string()).is_fatal());
        assert!(DeployError::Interrupted.is_fatal());
        assert!(DeployError::cluster_api("create", "Deployment", "web", "boom").is_fatal());
    }

    #[test]
    fn test_kind_names_match_error_vocabulary() {
        assert_eq!(
            DeployError::Authorization(String::new()).kind().as_str(),
            "AuthorizationError"
        );
        assert_eq!(
            DeployError::invalid_manifest("a.yaml", "bad").kind().to_string(),
            "InvalidManifestError"
        );
        assert_eq!(
            DeployError::cluster_api("get", "Service", "svc", "500").kind(),
            DeployErrorKind::ClusterApi
        );
    }

    #[test]
    fn test_messages_carry_resource_detail() {
        let err = DeployError::governance("Service", "web", "selector has no appmgr-pod-app");
        let message = err.to_string();
        assert!(message.contains("Service"));
        assert!(message.contains("'web'"));
        assert!(message.contains("appmgr-pod-app"));
    }
}
