//! In-memory [`ResourceManager`] used by `--dry-run` and the test suite.
//!
//! Objects are stored as JSON keyed by `(apiVersion/kind, namespace, name)`.
//! Every call is recorded so callers can assert on the exact sequence of
//! fetch/create/replace/delete operations.

use super::ResourceManager;
use crate::error::DeployError;
use crate::registry::ManagedResource;
use async_trait::async_trait;
use kube::ResourceExt;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Cluster operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Fetch,
    Create,
    Replace,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Replace => "replace",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call made against the manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCall {
    pub operation: Operation,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

type ObjectKey = (String, Option<String>, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, serde_json::Value>,
    calls: Vec<RecordedCall>,
    failures: HashSet<(Operation, String, String)>,
    next_version: u64,
}

/// Cluster stand-in that never leaves the process
#[derive(Debug, Default)]
pub struct InMemoryResourceManager {
    state: Mutex<State>,
    endpoint: Option<String>,
}

fn type_key<K: ManagedResource>() -> String {
    format!("{}/{}", K::api_version(&()), K::kind(&()))
}

fn object_key<K: ManagedResource>(namespace: Option<&str>, name: &str) -> ObjectKey {
    (type_key::<K>(), namespace.map(str::to_string), name.to_string())
}

impl InMemoryResourceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `endpoint` as the cluster URL
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-populate an object as if it already existed in the cluster
    pub fn seed<K: ManagedResource>(&self, namespace: Option<&str>, resource: &K) -> Result<(), DeployError> {
        let name = resource.name_any();
        let value = serde_json::to_value(resource)
            .map_err(|e| DeployError::cluster_api("seed", K::kind(&()), &name, e))?;
        self.state()
            .objects
            .insert(object_key::<K>(namespace, &name), value);
        Ok(())
    }

    /// Make the next and every later `operation` on `kind`/`name` fail
    pub fn fail_on(&self, operation: Operation, kind: &str, name: &str) {
        self.state()
            .failures
            .insert((operation, kind.to_string(), name.to_string()));
    }

    /// Stored object, decoded
    #[must_use]
    pub fn stored<K: ManagedResource>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        self.state()
            .objects
            .get(&object_key::<K>(namespace, name))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Every call so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Calls that changed state
    #[must_use]
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.operation != Operation::Fetch)
            .cloned()
            .collect()
    }

    fn record<K: ManagedResource>(
        &self,
        operation: Operation,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<MutexGuard<'_, State>, DeployError> {
        let kind = K::kind(&()).to_string();
        let mut state = self.state();
        state.calls.push(RecordedCall {
            operation,
            kind: kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        });
        if state
            .failures
            .contains(&(operation, kind.clone(), name.to_string()))
        {
            return Err(DeployError::cluster_api(
                operation.as_str(),
                kind,
                name,
                "injected failure",
            ));
        }
        Ok(state)
    }

    fn store<K: ManagedResource>(
        state: &mut State,
        namespace: Option<&str>,
        name: &str,
        resource: &K,
    ) -> Result<K, DeployError> {
        state.next_version += 1;
        let mut stored = resource.clone();
        stored.meta_mut().resource_version = Some(state.next_version.to_string());
        let value = serde_json::to_value(&stored)
            .map_err(|e| DeployError::cluster_api("store", K::kind(&()), name, e))?;
        state.objects.insert(object_key::<K>(namespace, name), value);
        Ok(stored)
    }
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    async fn fetch<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, DeployError> {
        let state = self.record::<K>(Operation::Fetch, namespace, name)?;
        state
            .objects
            .get(&object_key::<K>(namespace, name))
            .map(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| DeployError::cluster_api("get", K::kind(&()), name, e))
            })
            .transpose()
    }

    async fn create<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        resource: &K,
    ) -> Result<K, DeployError> {
        let name = resource.name_any();
        let mut state = self.record::<K>(Operation::Create, namespace, &name)?;
        if state.objects.contains_key(&object_key::<K>(namespace, &name)) {
            return Err(DeployError::cluster_api(
                "create",
                K::kind(&()),
                &name,
                "already exists",
            ));
        }
        Self::store(&mut state, namespace, &name, resource)
    }

    async fn replace<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        resource: &K,
    ) -> Result<K, DeployError> {
        let mut state = self.record::<K>(Operation::Replace, namespace, name)?;
        if !state.objects.contains_key(&object_key::<K>(namespace, name)) {
            return Err(DeployError::cluster_api(
                "replace",
                K::kind(&()),
                name,
                "not found",
            ));
        }
        Self::store(&mut state, namespace, name, resource)
    }

    async fn delete<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, DeployError> {
        let mut state = self.record::<K>(Operation::Delete, namespace, name)?;
        Ok(state
            .objects
            .remove(&object_key::<K>(namespace, name))
            .is_some())
    }

    fn endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lifecycle_and_call_log() {
        let manager = InMemoryResourceManager::new();
        let ns = Some("team-a");

        assert!(manager.fetch::<ConfigMap>(ns, "c").await.unwrap().is_none());
        let created = manager.create(ns, &config_map("c")).await.unwrap();
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));
        let replaced = manager.replace(ns, "c", &config_map("c")).await.unwrap();
        assert_eq!(replaced.metadata.resource_version.as_deref(), Some("2"));
        assert!(manager.delete::<ConfigMap>(ns, "c").await.unwrap());
        assert!(!manager.delete::<ConfigMap>(ns, "c").await.unwrap());

        let ops: Vec<_> = manager.calls().iter().map(|c| c.operation).collect();
        assert_eq!(
            ops,
            vec![
                Operation::Fetch,
                Operation::Create,
                Operation::Replace,
                Operation::Delete,
                Operation::Delete
            ]
        );
        assert_eq!(manager.mutations().len(), 4);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let manager = InMemoryResourceManager::new();
        manager.seed(Some("a"), &config_map("c")).unwrap();
        assert!(manager.stored::<ConfigMap>(Some("a"), "c").is_some());
        assert!(manager.stored::<ConfigMap>(Some("b"), "c").is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let manager = InMemoryResourceManager::new();
        manager.fail_on(Operation::Fetch, "ConfigMap", "c");
        let err = manager.fetch::<ConfigMap>(None, "c").await.unwrap_err();
        assert!(matches!(err, DeployError::ClusterApi { operation: "fetch", .. }));
    }
}
