//! # Deployment Task
//!
//! One end-to-end run: validate the config, discover manifest files, resolve
//! the namespace allow-set, write the registry pull secret and apply every
//! file. The outcome is always a [`TaskResult`]; errors are folded into it
//! rather than returned, so the caller can report them and still export the
//! variables gathered before the failure.

use super::ManifestApplier;
use crate::authz::{AppManagerClient, NamespaceGate};
use crate::config::DeployConfig;
use crate::constants::{KUBERNETES_SECRET_NAME_PROP, UNKNOWN_MASTER_HOST};
use crate::error::{DeployError, DeployErrorKind};
use crate::manifest::{find_manifest_files, EnvVars};
use crate::observability::metrics;
use crate::registry::ResourceRegistry;
use crate::secrets::{derive_name, pull_secret};
use crate::updater::{AppliedResource, LoggingMonitor, ResourceManager, ResourceUpdateMonitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    Success,
    HasError,
}

impl CommandState {
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, CommandState::HasError)
    }
}

/// The error that ended a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: DeployErrorKind,
    pub message: String,
}

impl From<&DeployError> for RunFailure {
    fn from(err: &DeployError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one run, handed back to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub command_state: CommandState,
    /// Cluster endpoint contacted, `"Unknown"` when not available
    pub master_host: String,
    /// Variables to export to later pipeline steps
    pub extra_env_vars: BTreeMap<String, String>,
    /// Every resource that reached the cluster, including those applied
    /// before the error of a failed run
    pub applied: Vec<AppliedResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl TaskResult {
    fn new(master_host: String) -> Self {
        Self {
            command_state: CommandState::HasError,
            master_host,
            extra_env_vars: BTreeMap::new(),
            applied: Vec::new(),
            error: None,
        }
    }
}

/// A configured deployment run
pub struct DeploymentTask<M> {
    config: DeployConfig,
    registry: Arc<ResourceRegistry<M>>,
    manager: Arc<M>,
    env: EnvVars,
    monitor: Arc<dyn ResourceUpdateMonitor>,
    cancel: Option<watch::Receiver<bool>>,
    app_manager_timeout: Option<Duration>,
}

impl<M> std::fmt::Debug for DeploymentTask<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentTask")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<M: ResourceManager + 'static> DeploymentTask<M> {
    #[must_use]
    pub fn new(config: DeployConfig, registry: Arc<ResourceRegistry<M>>, manager: Arc<M>) -> Self {
        Self {
            config,
            registry,
            manager,
            env: EnvVars::default(),
            monitor: Arc::new(LoggingMonitor),
            cancel: None,
            app_manager_timeout: None,
        }
    }

    /// Variables for substitution and secret name expansion
    #[must_use]
    pub fn with_env(mut self, env: EnvVars) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn ResourceUpdateMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_app_manager_timeout(mut self, timeout: Duration) -> Self {
        self.app_manager_timeout = Some(timeout);
        self
    }

    /// Run to completion
    pub async fn run(mut self) -> TaskResult {
        let start = Instant::now();
        metrics::increment_runs();

        let master_host = self
            .manager
            .endpoint()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| UNKNOWN_MASTER_HOST.to_string());
        let mut result = TaskResult::new(master_host);

        match self.execute(&mut result).await {
            Ok(()) => {
                result.command_state = CommandState::Success;
                info!(
                    applied = result.applied.len(),
                    master = %result.master_host,
                    "Deployment finished"
                );
            }
            Err(e) => {
                error!(kind = %e.kind(), master = %result.master_host, "Deployment failed: {e}");
                metrics::increment_run_errors(e.kind().as_str());
                result.command_state = CommandState::HasError;
                result.error = Some(RunFailure::from(&e));
            }
        }

        metrics::observe_run_duration(start.elapsed().as_secs_f64());
        result
    }

    async fn execute(&mut self, result: &mut TaskResult) -> Result<(), DeployError> {
        self.config.validate()?;

        let files = find_manifest_files(&self.config.workspace, &self.config.config_patterns)?;
        if files.is_empty() {
            return Err(DeployError::Configuration(format!(
                "no matching config files found for '{}'",
                self.config.config_patterns
            )));
        }
        info!(count = files.len(), "Found configuration files");

        let mut applier = ManifestApplier::new(Arc::clone(&self.registry), Arc::clone(&self.manager))
            .with_mode(self.config.mode)
            .with_monitor(Arc::clone(&self.monitor));
        if let Some(cancel) = self.cancel.clone() {
            applier = applier.with_cancellation(cancel);
        }
        if let Some(governance) = self.config.governance() {
            let gate = self.resolve_gate().await?;
            applier = applier.with_governance(governance, gate);
        }

        if !self.config.registry_credentials.is_empty() {
            let name = derive_name(
                self.config.secret_name.as_deref(),
                self.config.secret_name_seed.as_deref(),
                &self.env,
            )?;
            info!(name = %name, namespace = %self.config.secret_namespace, "Preparing registry pull secret");
            let secret = pull_secret(
                &self.config.secret_namespace,
                &name,
                &self.config.registry_credentials,
            )?;
            result
                .applied
                .extend(applier.apply_resource(&secret, "registry-pull-secret").await?);

            info!("Exporting {KUBERNETES_SECRET_NAME_PROP}={name}");
            self.env.insert(KUBERNETES_SECRET_NAME_PROP, name.clone());
            result
                .extra_env_vars
                .insert(KUBERNETES_SECRET_NAME_PROP.to_string(), name);
        }

        if self.config.enable_substitution {
            applier.set_resolver(Some(self.env.clone()));
        }

        applier.apply_files_into(&files, &mut result.applied).await
    }

    /// Allow-set gate for a governed run
    async fn resolve_gate(&self) -> Result<NamespaceGate, DeployError> {
        let Some((url, credentials)) = self.config.app_manager() else {
            warn!("Governance metadata supplied but no app-manager endpoint configured");
            return Err(DeployError::Authorization(
                "governance requires an app-manager endpoint and credentials".to_string(),
            ));
        };
        let client = match self.app_manager_timeout {
            Some(timeout) => AppManagerClient::with_timeout(url, timeout)?,
            None => AppManagerClient::new(url)?,
        };
        let allowed = client.fetch_allowed_namespaces(credentials).await?;
        Ok(NamespaceGate::Enforce(allowed))
    }
}
