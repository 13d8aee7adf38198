//! Registry credentials and the `.dockercfg` pull secret built from them.

use crate::constants::{DEFAULT_DOCKER_REGISTRY_URL, DOCKERCFG_DATA_KEY, DOCKERCFG_SECRET_TYPE};
use crate::error::DeployError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Login for one private container registry
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RegistryCredential {
    /// Registry URL; Docker Hub when omitted
    #[serde(default)]
    pub url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegistryCredential {
    #[must_use]
    pub fn new(url: Option<&str>, username: &str, password: &str) -> Self {
        Self {
            url: url.map(str::to_string),
            username: username.to_string(),
            password: password.to_string(),
            email: None,
        }
    }

    /// Registry URL this credential is keyed under
    #[must_use]
    pub fn registry_url(&self) -> &str {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_DOCKER_REGISTRY_URL)
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("url", &self.registry_url())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct DockerCfgEntry {
    auth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

/// Serialize credentials into a legacy `.dockercfg` document
///
/// Later credentials for the same registry URL win.
pub fn build_dockercfg(credentials: &[RegistryCredential]) -> Result<Zeroizing<String>, DeployError> {
    let entries: BTreeMap<&str, DockerCfgEntry> = credentials
        .iter()
        .map(|c| {
            let pair = Zeroizing::new(format!("{}:{}", c.username, c.password));
            (
                c.registry_url(),
                DockerCfgEntry {
                    auth: STANDARD.encode(pair.as_bytes()),
                    email: c.email.clone().filter(|e| !e.trim().is_empty()),
                },
            )
        })
        .collect();

    serde_json::to_string(&entries)
        .map(Zeroizing::new)
        .map_err(|e| DeployError::Configuration(format!("failed to serialize docker config: {e}")))
}

/// The `kubernetes.io/dockercfg` Secret holding every credential
pub fn pull_secret(
    namespace: &str,
    name: &str,
    credentials: &[RegistryCredential],
) -> Result<Secret, DeployError> {
    let dockercfg = build_dockercfg(credentials)?;
    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([(
            DOCKERCFG_DATA_KEY.to_string(),
            dockercfg.as_str().to_string(),
        )])),
        type_: Some(DOCKERCFG_SECRET_TYPE.to_string()),
        ..Default::default()
    })
}
