//! # Constants
//!
//! Shared constants used throughout the deployer.
//!
//! Label keys are part of the contract with the app-manager platform and the
//! dashboards built on top of it, so their spelling must not change.

/// Maximum length of a generated or configured secret name (DNS-1123 label)
pub const KUBERNETES_NAME_LENGTH_LIMIT: usize = 63;

/// DNS-1123 label: lowercase alphanumeric and hyphens, alphanumeric at both ends
pub const KUBERNETES_NAME_PATTERN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";

/// Prefix for secret names derived from the default seed
pub const KUBERNETES_SECRET_NAME_PREFIX: &str = "pull-secret-";

/// Length of the random suffix appended to derived secret names
pub const SECRET_NAME_RANDOM_SUFFIX_LENGTH: usize = 8;

/// Environment variable exported with the registry pull secret name
pub const KUBERNETES_SECRET_NAME_PROP: &str = "KUBERNETES_SECRET_NAME";

/// Secret type for legacy docker config payloads
pub const DOCKERCFG_SECRET_TYPE: &str = "kubernetes.io/dockercfg";

/// Data key holding the docker config payload
pub const DOCKERCFG_DATA_KEY: &str = ".dockercfg";

/// Registry used when a credential does not name one
pub const DEFAULT_DOCKER_REGISTRY_URL: &str = "https://index.docker.io/v1/";

/// Cluster endpoint reported when the client does not expose one
pub const UNKNOWN_MASTER_HOST: &str = "Unknown";

/// Response code the app-manager login endpoint returns on success
pub const APP_MANAGER_SUCCESS_CODE: i64 = 200;

/// Default HTTP timeout for the app-manager login call (seconds)
pub const DEFAULT_APP_MANAGER_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Governance label vocabulary
// ---------------------------------------------------------------------------

/// Application a workload belongs to
pub const LABEL_APP: &str = "appmgr-app";

/// Load type of a workload (Deployment, StatefulSet, ...)
pub const LABEL_LOADTYPE: &str = "appmgr-loadType";

/// Workload a pod belongs to
pub const LABEL_POD_APP: &str = "appmgr-pod-app";

/// Tenant a pod belongs to
pub const LABEL_POD_TENANT: &str = "appmgr-pod-tenant";

/// Deployment a pod belongs to
pub const LABEL_POD_DEPLOYMENT: &str = "appmgr-pod-deployment";

/// StatefulSet a pod belongs to
pub const LABEL_POD_STATEFULSET: &str = "appmgr-pod-statefulset";

/// Load type of the workload owning a pod
pub const LABEL_POD_LOADTYPE: &str = "appmgr-pod-loadType";

pub const LABEL_SERVICE_APP: &str = "appmgr-service-app";
pub const LABEL_SERVICE_PROJECT: &str = "appmgr-service-project";
pub const LABEL_SERVICE_TENANT: &str = "appmgr-service-tenant";

pub const LABEL_INGRESS_PROJECT: &str = "appmgr-ingress-project";
pub const LABEL_INGRESS_TENANT: &str = "appmgr-ingress-tenant";

pub const LABEL_AUTOSCALER_APP: &str = "appmgr-autoscaler-app";
pub const LABEL_AUTOSCALER_LOADTYPE: &str = "appmgr-autoscaler-loadType";
pub const LABEL_AUTOSCALER_PROJECT: &str = "appmgr-autoscaler-project";
pub const LABEL_AUTOSCALER_TENANT: &str = "appmgr-autoscaler-tenant";

/// Annotations marking a Secret as a key-value secret for the platform UI
pub const ANNOTATION_SECRET_TYPE: &str = "appmgr.secrets.type";
pub const ANNOTATION_MLOG_SECRET_TYPE: &str = "mlog.secrets.type";
pub const SECRET_TYPE_KEY_VALUE: &str = "KEY_VALUE_SECRET";
