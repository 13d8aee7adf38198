//! # Cluster Connection
//!
//! Builds a `kube::Client` from whichever credential form the pipeline hands
//! over. Token and client-certificate credentials are rendered into a
//! single-context kubeconfig so every form goes through the same kube config
//! loader.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use tracing::info;
use zeroize::Zeroizing;

const CONTEXT_NAME: &str = "kube-deployer";

/// How to reach and authenticate against the cluster
#[derive(Clone)]
pub enum ClusterCredentials {
    /// Kubeconfig file on disk
    KubeconfigFile(PathBuf),
    /// Kubeconfig document passed inline
    KubeconfigContent(Zeroizing<String>),
    /// API server URL and bearer token
    Token {
        server: String,
        token: Zeroizing<String>,
        /// PEM bundle; the system roots are used when absent
        certificate_authority: Option<String>,
    },
    /// API server URL and client certificate/key, all PEM
    ClientCertificate {
        server: String,
        certificate_authority: String,
        client_certificate: String,
        client_key: Zeroizing<String>,
    },
    /// In-cluster service account or `$KUBECONFIG` / `~/.kube/config`
    Infer,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterCredentials::KubeconfigFile(path) => {
                f.debug_tuple("KubeconfigFile").field(path).finish()
            }
            ClusterCredentials::KubeconfigContent(_) => f.write_str("KubeconfigContent(<redacted>)"),
            ClusterCredentials::Token { server, .. } => f
                .debug_struct("Token")
                .field("server", server)
                .finish_non_exhaustive(),
            ClusterCredentials::ClientCertificate { server, .. } => f
                .debug_struct("ClientCertificate")
                .field("server", server)
                .finish_non_exhaustive(),
            ClusterCredentials::Infer => f.write_str("Infer"),
        }
    }
}

/// Kubeconfig with one cluster, one user and one current context
fn single_context_kubeconfig(
    server: &str,
    cluster: serde_json::Value,
    user: serde_json::Value,
) -> Result<Kubeconfig> {
    let mut cluster = cluster;
    cluster["server"] = json!(server);
    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": CONTEXT_NAME, "cluster": cluster }],
        "users": [{ "name": CONTEXT_NAME, "user": user }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": { "cluster": CONTEXT_NAME, "user": CONTEXT_NAME }
        }],
        "current-context": CONTEXT_NAME,
    });
    let yaml = Zeroizing::new(
        serde_yaml::to_string(&document).context("Failed to render kubeconfig")?,
    );
    Kubeconfig::from_yaml(&yaml).context("Failed to load generated kubeconfig")
}

fn pem_data(pem: &str) -> String {
    STANDARD.encode(pem.trim().as_bytes())
}

impl ClusterCredentials {
    /// Resolve into a kube client configuration
    pub async fn to_config(&self) -> Result<Config> {
        let options = KubeConfigOptions::default();
        match self {
            ClusterCredentials::KubeconfigFile(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("Failed to load kubeconfig")
            }
            ClusterCredentials::KubeconfigContent(content) => {
                let kubeconfig = Kubeconfig::from_yaml(content).context("Failed to parse kubeconfig content")?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("Failed to load kubeconfig")
            }
            ClusterCredentials::Token {
                server,
                token,
                certificate_authority,
            } => {
                let cluster = match certificate_authority {
                    Some(ca) => json!({ "certificate-authority-data": pem_data(ca) }),
                    None => json!({}),
                };
                let user = json!({ "token": token.as_str() });
                let kubeconfig = single_context_kubeconfig(server, cluster, user)?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("Failed to build token configuration")
            }
            ClusterCredentials::ClientCertificate {
                server,
                certificate_authority,
                client_certificate,
                client_key,
            } => {
                let cluster = json!({ "certificate-authority-data": pem_data(certificate_authority) });
                let user = json!({
                    "client-certificate-data": pem_data(client_certificate),
                    "client-key-data": pem_data(client_key),
                });
                let kubeconfig = single_context_kubeconfig(server, cluster, user)?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("Failed to build client certificate configuration")
            }
            ClusterCredentials::Infer => Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration"),
        }
    }

    /// Connect, returning the client and the API server URL it talks to
    pub async fn connect(&self) -> Result<(Client, String)> {
        let config = self.to_config().await?;
        let endpoint = config.cluster_url.to_string();
        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        info!(endpoint = %endpoint, "Connected to Kubernetes API");
        Ok((client, endpoint))
    }
}
