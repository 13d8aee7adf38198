//! # Managed Kinds
//!
//! The capability table every supported kind implements: how to build a
//! scoped `Api<K>`, how governance labels it, and what a replacement carries
//! forward from the live object.

use crate::error::DeployError;
use crate::governance::{inject, GovernanceContext};
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
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A typed Kubernetes model the deployer knows how to apply
pub trait ManagedResource:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Cluster-scoped kinds ignore any namespace in the manifest
    const NAMESPACED: bool;

    /// `Api<Self>` for the given namespace; namespaced kinds fall back to the
    /// client's default namespace
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;

    /// Merge governance labels; kinds without a vocabulary pass through
    fn inject_governance(self, _ctx: &GovernanceContext) -> Result<Self, DeployError> {
        Ok(self)
    }

    /// Carry fields from the live object into the desired one before a
    /// full-object replace
    #[must_use]
    fn prepare_replacement(mut self, current: &Self) -> Self {
        self.meta_mut().resource_version = current.resource_version();
        self
    }
}

macro_rules! namespaced {
    ($($ty:ty $(=> $inject:path)?),+ $(,)?) => {
        $(
            impl ManagedResource for $ty {
                const NAMESPACED: bool = true;

                fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                    match namespace {
                        Some(ns) => Api::namespaced(client, ns),
                        None => Api::default_namespaced(client),
                    }
                }

                $(
                    fn inject_governance(self, ctx: &GovernanceContext) -> Result<Self, DeployError> {
                        $inject(self, ctx)
                    }
                )?
            }
        )+
    };
}

macro_rules! cluster_scoped {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ManagedResource for $ty {
                const NAMESPACED: bool = false;

                fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
                    Api::all(client)
                }
            }
        )+
    };
}

namespaced!(
    ConfigMap,
    Secret => inject::secret,
    ServiceAccount,
    PersistentVolumeClaim,
    Pod,
    LimitRange,
    ResourceQuota,
    Deployment => inject::deployment,
    StatefulSet => inject::stateful_set,
    DaemonSet,
    ReplicaSet,
    autoscaling_v1::HorizontalPodAutoscaler => inject::autoscaler_v1,
    autoscaling_v2::HorizontalPodAutoscaler => inject::autoscaler_v2,
    Job,
    CronJob,
    Ingress => inject::ingress,
    NetworkPolicy,
    PodDisruptionBudget,
    Role,
    RoleBinding,
);

cluster_scoped!(
    Namespace,
    PersistentVolume,
    IngressClass,
    ClusterRole,
    ClusterRoleBinding,
    StorageClass,
    PriorityClass,
    CustomResourceDefinition,
    ValidatingWebhookConfiguration,
    MutatingWebhookConfiguration,
);

impl ManagedResource for Service {
    const NAMESPACED: bool = true;

    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::default_namespaced(client),
        }
    }

    fn inject_governance(self, ctx: &GovernanceContext) -> Result<Self, DeployError> {
        inject::service(self, ctx)
    }

    /// The API server rejects a Service replace that drops the allocated
    /// cluster IP
    fn prepare_replacement(mut self, current: &Self) -> Self {
        self.metadata.resource_version = current.resource_version();
        if let (Some(desired), Some(live)) = (self.spec.as_mut(), current.spec.as_ref()) {
            if desired.cluster_ip.is_none() {
                desired.cluster_ip.clone_from(&live.cluster_ip);
            }
            if desired.cluster_ips.is_none() {
                desired.cluster_ips.clone_from(&live.cluster_ips);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn meta(name: &str, resource_version: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            resource_version: resource_version.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_replacement_carries_resource_version() {
        let current = ConfigMap {
            metadata: meta("settings", Some("42")),
            ..Default::default()
        };
        let desired = ConfigMap {
            metadata: meta("settings", None),
            ..Default::default()
        }
        .prepare_replacement(&current);
        assert_eq!(desired.metadata.resource_version.as_deref(), Some("42"));
    }

    #[test]
    fn test_service_replacement_keeps_cluster_ip() {
        let current = Service {
            metadata: meta("web", Some("7")),
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.0.0.12".to_string()),
                cluster_ips: Some(vec!["10.0.0.12".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let desired = Service {
            metadata: meta("web", None),
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        }
        .prepare_replacement(&current);

        let spec = desired.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.0.0.12"));
        assert_eq!(spec.cluster_ips, Some(vec!["10.0.0.12".to_string()]));
        assert_eq!(desired.metadata.resource_version.as_deref(), Some("7"));
    }

    #[test]
    fn test_scope_flags() {
        assert!(<Deployment as ManagedResource>::NAMESPACED);
        assert!(!<Namespace as ManagedResource>::NAMESPACED);
        assert!(!<ClusterRole as ManagedResource>::NAMESPACED);
    }
}
