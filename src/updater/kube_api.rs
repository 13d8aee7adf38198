//! [`ResourceManager`] backed by a live cluster through `kube::Api`.

use super::ResourceManager;
use crate::error::DeployError;
use crate::registry::ManagedResource;
use async_trait::async_trait;
use kube::api::{DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, error};

#[derive(Clone)]
pub struct KubeResourceManager {
    client: Client,
    endpoint: Option<String>,
}

impl std::fmt::Debug for KubeResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceManager")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl KubeResourceManager {
    /// `endpoint` is the cluster URL the client was configured with
    #[must_use]
    pub fn new(client: Client, endpoint: Option<String>) -> Self {
        Self { client, endpoint }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn api_failure<K: ManagedResource>(operation: &'static str, name: &str, err: &kube::Error) -> DeployError {
    error!(operation = operation, kind = %K::kind(&()), name = %name, error = %err, "Cluster API call failed");
    DeployError::cluster_api(operation, K::kind(&()), name, err)
}

#[async_trait]
impl ResourceManager for KubeResourceManager {
    async fn fetch<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, DeployError> {
        let api = K::api(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(current) => Ok(Some(current)),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(kind = %K::kind(&()), name = %name, "Resource not found");
                Ok(None)
            }
            Err(e) => Err(api_failure::<K>("get", name, &e)),
        }
    }

    async fn create<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        resource: &K,
    ) -> Result<K, DeployError> {
        let api = K::api(self.client.clone(), namespace);
        api.create(&PostParams::default(), resource)
            .await
            .map_err(|e| api_failure::<K>("create", &resource.name_any(), &e))
    }

    async fn replace<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
        resource: &K,
    ) -> Result<K, DeployError> {
        let api = K::api(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), resource)
            .await
            .map_err(|e| api_failure::<K>("replace", name, &e))
    }

    async fn delete<K: ManagedResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, DeployError> {
        let api = K::api(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(kind = %K::kind(&()), name = %name, "Resource already deleted");
                Ok(false)
            }
            Err(e) => Err(api_failure::<K>("delete", name, &e)),
        }
    }

    fn endpoint(&self) -> Option<String> {
        self.endpoint.clone()
    }
}
