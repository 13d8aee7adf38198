//! # Resource Updater
//!
//! The per-kind apply state machine:
//!
//! ```text
//! Unresolved -> Fetched{present|absent} -> {Created|Replaced|Deleted} -> Notified
//! ```
//!
//! A not-found fetch is the `absent` branch, never an error. Any other
//! cluster failure ends the resource with [`DeployError::ClusterApi`] and the
//! orchestrator aborts the run. Replacement is a full-object overwrite of the
//! desired object after [`ManagedResource::prepare_replacement`].
//!
//! Cluster access goes through [`ResourceManager`], implemented against a live
//! cluster by [`KubeResourceManager`] and in memory by
//! [`InMemoryResourceManager`] for dry runs and tests.

pub mod kube_api;
pub mod memory;

pub use kube_api::KubeResourceManager;
pub use memory::{InMemoryResourceManager, RecordedCall};

use crate::error::DeployError;
use crate::governance::GovernanceContext;
use crate::manifest::ManifestDocument;
use crate::registry::ManagedResource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Typed access to the cluster, one call per state transition
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// `Ok(None)` when the object does not exist
    async fn fetch<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, DeployError>;

    async fn create<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        resource: &K,
    ) -> Result<K, DeployError>;

    async fn replace<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        resource: &K,
    ) -> Result<K, DeployError>;

    /// `Ok(false)` when there was nothing to delete
    async fn delete<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, DeployError>;

    /// Cluster endpoint this manager talks to, for the run report
    fn endpoint(&self) -> Option<String>;
}

/// Whether a run applies its manifests or removes them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyMode {
    #[default]
    Apply,
    Delete,
}

/// Terminal state of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Created,
    Replaced,
    Deleted,
    /// Deletion of an object that did not exist
    Absent,
}

impl UpdateAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateAction::Created => "created",
            UpdateAction::Replaced => "replaced",
            UpdateAction::Deleted => "deleted",
            UpdateAction::Absent => "absent",
        }
    }
}

impl fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied resource in the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedResource {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub action: UpdateAction,
}

/// What the monitor sees after a state transition
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub action: UpdateAction,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    /// Live object before the transition, if there was one
    pub original: Option<serde_json::Value>,
    /// Object returned by the cluster after the transition
    pub current: Option<serde_json::Value>,
}

/// Observation hook called after each create, replace or delete
///
/// Implementations must not fail or block the run.
pub trait ResourceUpdateMonitor: Send + Sync {
    fn on_update(&self, _event: &UpdateEvent) {}
}

/// Monitor that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl ResourceUpdateMonitor for NoopMonitor {}

/// Monitor that logs each transition and the resulting resource version
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMonitor;

impl ResourceUpdateMonitor for LoggingMonitor {
    fn on_update(&self, event: &UpdateEvent) {
        let resource_version = event
            .current
            .as_ref()
            .and_then(|c| c.pointer("/metadata/resourceVersion"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        info!(
            action = %event.action,
            kind = %event.kind,
            name = %event.name,
            namespace = event.namespace.as_deref().unwrap_or_default(),
            resource_version = %resource_version,
            "Resource updated"
        );
    }
}

/// Per-run inputs shared by every updater call
pub struct ApplyContext<'a> {
    pub mode: ApplyMode,
    /// Labels to inject; `None` leaves objects as written
    pub governance: Option<&'a GovernanceContext>,
    pub monitor: &'a dyn ResourceUpdateMonitor,
}

impl fmt::Debug for ApplyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyContext")
            .field("mode", &self.mode)
            .field("governance", &self.governance)
            .finish_non_exhaustive()
    }
}

/// Kind-erased updater stored in the registry
#[async_trait]
pub trait ResourceUpdater<M>: Send + Sync {
    async fn apply(
        &self,
        manager: &M,
        document: &ManifestDocument,
        ctx: &ApplyContext<'_>,
    ) -> Result<AppliedResource, DeployError>;
}

/// The state machine for one concrete kind
pub struct TypedUpdater<K> {
    _kind: PhantomData<fn() -> K>,
}

impl<K> TypedUpdater<K> {
    #[must_use]
    pub fn new() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<K> Default for TypedUpdater<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ManagedResource> fmt::Debug for TypedUpdater<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedUpdater<{}>", K::kind(&()))
    }
}

fn snapshot<K: ManagedResource>(resource: &K) -> Option<serde_json::Value> {
    serde_json::to_value(resource).ok()
}

#[async_trait]
impl<K, M> ResourceUpdater<M> for TypedUpdater<K>
where
    K: ManagedResource,
    M: ResourceManager,
{
    async fn apply(
        &self,
        manager: &M,
        document: &ManifestDocument,
        ctx: &ApplyContext<'_>,
    ) -> Result<AppliedResource, DeployError> {
        let name = document.name();
        if name.is_empty() {
            return Err(DeployError::invalid_manifest(
                &document.source,
                "missing metadata.name",
            ));
        }
        let namespace = if K::NAMESPACED {
            document.namespace()
        } else {
            None
        };
        let kind = K::kind(&()).to_string();

        let (action, original, current) = match ctx.mode {
            ApplyMode::Apply => {
                let mut desired: K = document.decode()?;
                if let Some(governance) = ctx.governance {
                    desired = desired.inject_governance(governance)?;
                }

                match manager.fetch::<K>(namespace, name).await? {
                    None => {
                        debug!(kind = %kind, name = %name, "Resource absent, creating");
                        let created = manager.create(namespace, &desired).await?;
                        (UpdateAction::Created, None, snapshot(&created))
                    }
                    Some(live) => {
                        debug!(kind = %kind, name = %name, "Resource present, replacing");
                        let desired = desired.prepare_replacement(&live);
                        let replaced = manager.replace(namespace, name, &desired).await?;
                        (UpdateAction::Replaced, snapshot(&live), snapshot(&replaced))
                    }
                }
            }
            ApplyMode::Delete => {
                if manager.delete::<K>(namespace, name).await? {
                    (UpdateAction::Deleted, None, None)
                } else {
                    debug!(kind = %kind, name = %name, "Resource already absent");
                    (UpdateAction::Absent, None, None)
                }
            }
        };

        ctx.monitor.on_update(&UpdateEvent {
            action,
            kind: kind.clone(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            original,
            current,
        });

        Ok(AppliedResource {
            api_version: document.api_version.clone(),
            kind,
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            action,
        })
    }
}
