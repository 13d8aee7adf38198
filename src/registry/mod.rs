//! # Resource Type Registry
//!
//! Maps a manifest's `(apiVersion, kind)` to the typed updater for that kind.
//!
//! The table is built once from the list of known models below. Each entry's
//! `(group, version, kind)` is derived from its model name (see [`naming`])
//! and cross-checked against the model's own static metadata, so a typo in
//! the list fails start-up instead of silently dropping a kind. After
//! construction the registry is read-only and can be shared across runs.

pub mod kinds;
pub mod naming;

pub use kinds::ManagedResource;

use crate::error::DeployError;
use crate::updater::{ResourceManager, ResourceUpdater, TypedUpdater};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::{v1 as autoscaling_v1, v2 as autoscaling_v2};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, LimitRange, Namespace, PersistentVolume, PersistentVolumeClaim, Pod, ResourceQuota,
    Secret, Service, ServiceAccount,
};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass, NetworkPolicy};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::scheduling::v1::PriorityClass;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use naming::parse_model_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry lookup key: `apiVersion` and `kind` exactly as a manifest writes them
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub api_version: String,
    pub kind: String,
}

impl ResourceKey {
    #[must_use]
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Everything the orchestrator needs to apply one kind
pub struct ResourceKindBinding<M> {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub model_name: &'static str,
    pub updater: Arc<dyn ResourceUpdater<M>>,
}

impl<M> fmt::Debug for ResourceKindBinding<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceKindBinding")
            .field("group", &self.group)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

/// Read-only `(apiVersion, kind)` to updater table
pub struct ResourceRegistry<M> {
    bindings: HashMap<ResourceKey, ResourceKindBinding<M>>,
}

impl<M> fmt::Debug for ResourceRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("kinds", &self.bindings.len())
            .finish()
    }
}

macro_rules! register_models {
    ($registry:ident; $($model:literal => $ty:ty),+ $(,)?) => {
        $( $registry.register::<$ty>($model)?; )+
    };
}

impl<M: ResourceManager + 'static> ResourceRegistry<M> {
    /// Build the table of every known model
    pub fn new() -> Result<Self, DeployError> {
        let mut registry = Self {
            bindings: HashMap::new(),
        };

        register_models!(registry;
            "V1Namespace" => Namespace,
            "V1ConfigMap" => ConfigMap,
            "V1Secret" => Secret,
            "V1Service" => Service,
            "V1ServiceAccount" => ServiceAccount,
            "V1PersistentVolumeClaim" => PersistentVolumeClaim,
            "V1PersistentVolume" => PersistentVolume,
            "V1Pod" => Pod,
            "V1LimitRange" => LimitRange,
            "V1ResourceQuota" => ResourceQuota,
            "AppsV1Deployment" => Deployment,
            "AppsV1StatefulSet" => StatefulSet,
            "AppsV1DaemonSet" => DaemonSet,
            "AppsV1ReplicaSet" => ReplicaSet,
            "AutoscalingV1HorizontalPodAutoscaler" => autoscaling_v1::HorizontalPodAutoscaler,
            "AutoscalingV2HorizontalPodAutoscaler" => autoscaling_v2::HorizontalPodAutoscaler,
            "BatchV1Job" => Job,
            "BatchV1CronJob" => CronJob,
            "NetworkingV1Ingress" => Ingress,
            "NetworkingV1IngressClass" => IngressClass,
            "NetworkingV1NetworkPolicy" => NetworkPolicy,
            "PolicyV1PodDisruptionBudget" => PodDisruptionBudget,
            "RbacAuthorizationV1Role" => Role,
            "RbacAuthorizationV1RoleBinding" => RoleBinding,
            "RbacAuthorizationV1ClusterRole" => ClusterRole,
            "RbacAuthorizationV1ClusterRoleBinding" => ClusterRoleBinding,
            "StorageV1StorageClass" => StorageClass,
            "SchedulingV1PriorityClass" => PriorityClass,
            "ApiextensionsV1CustomResourceDefinition" => CustomResourceDefinition,
            "AdmissionregistrationV1ValidatingWebhookConfiguration" => ValidatingWebhookConfiguration,
            "AdmissionregistrationV1MutatingWebhookConfiguration" => MutatingWebhookConfiguration,
        );

        info!(kinds = registry.bindings.len(), "Resource registry initialized");
        Ok(registry)
    }

    /// Bind `K` under the triple derived from `model_name`
    pub fn register<K: ManagedResource>(&mut self, model_name: &'static str) -> Result<(), DeployError> {
        let derived = parse_model_name(model_name);
        let (group, version, kind) = (K::group(&()), K::version(&()), K::kind(&()));

        if derived.group != group || derived.version != version || derived.kind != kind {
            return Err(DeployError::Registry(format!(
                "model {model_name} resolves to {}/{} but the type is {}/{}",
                derived.api_version(),
                derived.kind,
                K::api_version(&()),
                kind
            )));
        }

        let key = ResourceKey::new(derived.api_version(), derived.kind.clone());
        if self.bindings.contains_key(&key) {
            return Err(DeployError::Registry(format!(
                "duplicate binding for {key} (model {model_name})"
            )));
        }

        debug!(key = %key, model = model_name, "Registered resource kind");
        self.bindings.insert(
            key,
            ResourceKindBinding {
                group: derived.group,
                version: derived.version,
                kind: derived.kind,
                model_name,
                updater: Arc::new(TypedUpdater::<K>::new()),
            },
        );
        Ok(())
    }

    /// Binding for a manifest's `apiVersion` and `kind`
    ///
    /// An unbound kind is [`DeployError::UnknownKind`], which callers treat
    /// as a skip rather than a failure.
    pub fn lookup(&self, api_version: &str, kind: &str) -> Result<&ResourceKindBinding<M>, DeployError> {
        self.bindings
            .get(&ResourceKey::new(api_version, kind))
            .ok_or_else(|| DeployError::UnknownKind {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, api_version: &str, kind: &str) -> bool {
        self.bindings.contains_key(&ResourceKey::new(api_version, kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Registered keys in sorted order
    #[must_use]
    pub fn keys(&self) -> Vec<&ResourceKey> {
        let mut keys: Vec<_> = self.bindings.keys().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::InMemoryResourceManager;

    fn registry() -> ResourceRegistry<InMemoryResourceManager> {
        ResourceRegistry::new().unwrap()
    }

    #[test]
    fn test_lookup_by_manifest_api_version() {
        let registry = registry();
        let binding = registry.lookup("apps/v1", "Deployment").unwrap();
        assert_eq!(binding.group, "apps");
        assert_eq!(binding.model_name, "AppsV1Deployment");

        assert!(registry.contains("v1", "Namespace"));
        assert!(registry.contains("autoscaling/v1", "HorizontalPodAutoscaler"));
        assert!(registry.contains("autoscaling/v2", "HorizontalPodAutoscaler"));
        assert!(registry.contains("rbac.authorization.k8s.io/v1", "ClusterRole"));
    }

    #[test]
    fn test_unknown_kind_is_non_fatal() {
        let err = registry().lookup("example.com/v1", "Widget").unwrap_err();
        assert!(matches!(err, DeployError::UnknownKind { .. }));
        assert!(!err.is_fatal());

        // the version is part of the key
        assert!(registry().lookup("apps/v1beta1", "Deployment").is_err());
    }

    #[test]
    fn test_every_binding_round_trips_its_model_name() {
        let registry = registry();
        for key in registry.keys() {
            let binding = registry.lookup(&key.api_version, &key.kind).unwrap();
            assert_eq!(
                naming::model_name(&binding.group, &binding.version, &binding.kind).as_deref(),
                Some(binding.model_name)
            );
        }
    }

    #[test]
    fn test_mismatched_model_name_rejected() {
        let mut registry = ResourceRegistry::<InMemoryResourceManager> {
            bindings: HashMap::new(),
        };
        let err = registry.register::<Deployment>("AppsV1StatefulSet").unwrap_err();
        assert!(matches!(err, DeployError::Registry(_)));

        registry.register::<Deployment>("AppsV1Deployment").unwrap();
        let err = registry.register::<Deployment>("AppsV1Deployment").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
