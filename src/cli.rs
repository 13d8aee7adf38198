//! # kube-deploy CLI
//!
//! Command-line surface of the deployer. Every flag can also come from a
//! `KUBE_DEPLOY_*` environment variable so pipelines can pass parameters
//! without building a command line.
//!
//! ## Usage
//!
//! ```bash
//! # Apply every manifest under k8s/ using the current kubeconfig
//! kube-deploy apply --configs 'k8s/**/*.yaml'
//!
//! # Governed deployment with a registry pull secret
//! kube-deploy apply --configs 'deploy/*.yml' \
//!     --app-code shop --tenant-code acme --project-name retail \
//!     --app-manager-url https://appmgr.example.com \
//!     --registry-credentials registries.yaml --enable-substitution
//!
//! # Remove what a previous apply created
//! kube-deploy delete --configs 'k8s/**/*.yaml'
//!
//! # Validate without touching the cluster
//! kube-deploy apply --configs 'k8s/**/*.yaml' --dry-run
//!
//! # List the resource kinds the deployer understands
//! kube-deploy kinds
//! ```

use crate::authz::AppManagerCredentials;
use crate::cluster::ClusterCredentials;
use crate::config::{load_registry_credentials, DeployConfig};
use crate::updater::ApplyMode;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Applies Kubernetes manifests with namespace authorization and tenancy labeling
#[derive(Debug, Parser)]
#[command(name = "kube-deploy", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or replace every resource in the matched manifests
    Apply(DeployArgs),
    /// Delete every resource in the matched manifests
    Delete(DeployArgs),
    /// List the apiVersion/kind pairs that can be applied
    Kinds,
}

/// How the run result is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Directory manifest patterns are resolved against
    #[arg(long, env = "KUBE_DEPLOY_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Comma-separated manifest patterns (`*`, `**`, `?`)
    #[arg(long, env = "KUBE_DEPLOY_CONFIGS")]
    pub configs: String,

    /// Namespace for the registry pull secret
    #[arg(long, env = "KUBE_DEPLOY_SECRET_NAMESPACE", default_value = "default")]
    pub secret_namespace: String,

    /// Pull secret name; `$VAR` placeholders are expanded
    #[arg(long, env = "KUBE_DEPLOY_SECRET_NAME")]
    pub secret_name: Option<String>,

    /// Seed for a derived pull secret name, e.g. the build name
    #[arg(long, env = "KUBE_DEPLOY_SECRET_NAME_SEED")]
    pub secret_name_seed: Option<String>,

    /// Expand `$VAR` / `${VAR}` in manifests from the environment
    #[arg(long, env = "KUBE_DEPLOY_ENABLE_SUBSTITUTION")]
    pub enable_substitution: bool,

    /// Validate and report without contacting the cluster
    #[arg(long, env = "KUBE_DEPLOY_DRY_RUN")]
    pub dry_run: bool,

    /// YAML list of `{url, username, password, email}` registry logins
    #[arg(long, env = "KUBE_DEPLOY_REGISTRY_CREDENTIALS")]
    pub registry_credentials: Option<PathBuf>,

    #[command(flatten)]
    pub governance: GovernanceArgs,

    #[command(flatten)]
    pub cluster: ClusterArgs,

    /// Write exported variables as KEY=value lines to this file
    #[arg(long, env = "KUBE_DEPLOY_EXPORT_ENV_FILE")]
    pub export_env_file: Option<PathBuf>,

    /// Write Prometheus metrics in text format to this file
    #[arg(long, env = "KUBE_DEPLOY_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

/// Ownership metadata and the app-manager that authorizes it
#[derive(Args)]
pub struct GovernanceArgs {
    #[arg(long, env = "KUBE_DEPLOY_APP_CODE")]
    pub app_code: Option<String>,

    #[arg(long, env = "KUBE_DEPLOY_TENANT_CODE")]
    pub tenant_code: Option<String>,

    #[arg(long, env = "KUBE_DEPLOY_PROJECT_NAME")]
    pub project_name: Option<String>,

    /// Base URL of the app-manager service
    #[arg(long, env = "KUBE_DEPLOY_APP_MANAGER_URL")]
    pub app_manager_url: Option<String>,

    #[arg(long, env = "KUBE_DEPLOY_APP_MANAGER_USERNAME")]
    pub app_manager_username: Option<String>,

    #[arg(long, env = "KUBE_DEPLOY_APP_MANAGER_PASSWORD", hide_env_values = true)]
    pub app_manager_password: Option<String>,
}

/// Cluster credentials; the first form given wins, otherwise the
/// configuration is inferred
#[derive(Args)]
pub struct ClusterArgs {
    /// Kubeconfig file
    #[arg(long, env = "KUBE_DEPLOY_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig document passed inline
    #[arg(long, env = "KUBE_DEPLOY_KUBECONFIG_CONTENT", hide_env_values = true)]
    pub kubeconfig_content: Option<String>,

    /// API server URL, used with --token or --client-certificate
    #[arg(long, env = "KUBE_DEPLOY_SERVER")]
    pub server: Option<String>,

    #[arg(long, env = "KUBE_DEPLOY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// PEM file with the cluster CA bundle
    #[arg(long, env = "KUBE_DEPLOY_CERTIFICATE_AUTHORITY")]
    pub certificate_authority: Option<PathBuf>,

    /// PEM file with the client certificate
    #[arg(long, env = "KUBE_DEPLOY_CLIENT_CERTIFICATE")]
    pub client_certificate: Option<PathBuf>,

    /// PEM file with the client key
    #[arg(long, env = "KUBE_DEPLOY_CLIENT_KEY")]
    pub client_key: Option<PathBuf>,
}

const REDACTED: &str = "<redacted>";

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| REDACTED)
}

impl std::fmt::Debug for GovernanceArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceArgs")
            .field("app_code", &self.app_code)
            .field("tenant_code", &self.tenant_code)
            .field("project_name", &self.project_name)
            .field("app_manager_url", &self.app_manager_url)
            .field("app_manager_username", &self.app_manager_username)
            .field("app_manager_password", &redact(self.app_manager_password.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for ClusterArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterArgs")
            .field("kubeconfig", &self.kubeconfig)
            .field("kubeconfig_content", &redact(self.kubeconfig_content.as_ref()))
            .field("server", &self.server)
            .field("token", &redact(self.token.as_ref()))
            .field("certificate_authority", &self.certificate_authority)
            .field("client_certificate", &self.client_certificate)
            .field("client_key", &self.client_key)
            .finish()
    }
}

fn read_pem(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

impl ClusterArgs {
    /// Pick the credential form from the flags given
    pub fn credentials(&self) -> Result<ClusterCredentials> {
        if let Some(path) = &self.kubeconfig {
            return Ok(ClusterCredentials::KubeconfigFile(path.clone()));
        }
        if let Some(content) = self.kubeconfig_content.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(ClusterCredentials::KubeconfigContent(Zeroizing::new(content.clone())));
        }
        let Some(server) = self.server.as_ref().filter(|s| !s.trim().is_empty()) else {
            if self.token.is_some() || self.client_certificate.is_some() {
                bail!("--server is required with --token or --client-certificate");
            }
            return Ok(ClusterCredentials::Infer);
        };

        let certificate_authority = self.certificate_authority.as_deref().map(read_pem).transpose()?;
        if let Some(token) = &self.token {
            return Ok(ClusterCredentials::Token {
                server: server.clone(),
                token: Zeroizing::new(token.clone()),
                certificate_authority,
            });
        }
        match (&self.client_certificate, &self.client_key, certificate_authority) {
            (Some(cert), Some(key), Some(ca)) => Ok(ClusterCredentials::ClientCertificate {
                server: server.clone(),
                certificate_authority: ca,
                client_certificate: read_pem(cert)?,
                client_key: Zeroizing::new(read_pem(key)?),
            }),
            _ => bail!(
                "--server needs either --token, or --client-certificate, --client-key and --certificate-authority"
            ),
        }
    }
}

impl DeployArgs {
    /// Resolve the flags into a run description
    pub fn deploy_config(&self, mode: ApplyMode) -> Result<DeployConfig> {
        let mut config = DeployConfig::new(&self.workspace, self.configs.clone());
        config.secret_namespace.clone_from(&self.secret_namespace);
        config.secret_name.clone_from(&self.secret_name);
        config.secret_name_seed.clone_from(&self.secret_name_seed);
        config.enable_substitution = self.enable_substitution;
        config.mode = mode;

        if let Some(path) = &self.registry_credentials {
            config.registry_credentials = load_registry_credentials(path)?;
        }

        let governance = &self.governance;
        config.app_code.clone_from(&governance.app_code);
        config.tenant_code.clone_from(&governance.tenant_code);
        config.project_name.clone_from(&governance.project_name);
        config.app_manager_url.clone_from(&governance.app_manager_url);
        config.app_manager_credentials = match (&governance.app_manager_username, &governance.app_manager_password) {
            (Some(username), Some(password)) => Some(AppManagerCredentials::new(username, password)),
            (None, None) => None,
            _ => bail!("--app-manager-username and --app-manager-password must be given together"),
        };

        Ok(config)
    }
}
