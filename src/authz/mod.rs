//! # Namespace Authorization
//!
//! The allow-set of namespaces a principal may deploy into, and the gate that
//! checks every governed resource against it before any mutating call.

pub mod app_manager;

pub use app_manager::{AppManagerClient, AppManagerCredentials};

use crate::error::DeployError;
use crate::manifest::ManifestDocument;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Namespaces a principal may deploy into for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceAllowSet {
    namespaces: BTreeSet<String>,
}

impl NamespaceAllowSet {
    #[must_use]
    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.contains(namespace)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NamespaceAllowSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            namespaces: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Gate between the loader and the updater
///
/// Only enforced when governance is active for the run; Namespace objects
/// always pass.
#[derive(Debug, Clone)]
pub enum NamespaceGate {
    Bypass,
    Enforce(NamespaceAllowSet),
}

impl NamespaceGate {
    /// Check that `document` may be mutated in its declared namespace
    pub fn check(&self, document: &ManifestDocument) -> Result<(), DeployError> {
        let NamespaceGate::Enforce(allowed) = self else {
            return Ok(());
        };
        if document.is_namespace() {
            return Ok(());
        }

        let Some(namespace) = document.namespace() else {
            warn!(kind = %document.kind, name = %document.name(), "Resource declares no namespace");
            return Err(DeployError::Authorization(format!(
                "{} '{}' must declare a namespace",
                document.kind,
                document.name()
            )));
        };

        debug!(namespace = %namespace, allowed = allowed.len(), "Checking namespace against allow-set");
        if allowed.contains(namespace) {
            Ok(())
        } else {
            warn!(kind = %document.kind, name = %document.name(), namespace = %namespace, "Namespace not in allow-set");
            Err(DeployError::Authorization(format!(
                "illegal namespace: no privilege for {namespace}"
            )))
        }
    }

    #[must_use]
    pub fn is_enforced(&self) -> bool {
        matches!(self, NamespaceGate::Enforce(_))
    }
}
