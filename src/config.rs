//! # Configuration
//!
//! [`DeployConfig`] is the resolved description of one run, assembled by the
//! CLI. [`RuntimeConfig`] holds process-level settings read from the
//! environment.

use crate::authz::AppManagerCredentials;
use crate::constants::DEFAULT_APP_MANAGER_TIMEOUT_SECS;
use crate::error::DeployError;
use crate::governance::GovernanceContext;
use crate::secrets::RegistryCredential;
use crate::updater::ApplyMode;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything one deployment run needs to know
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Directory manifest patterns are resolved against
    pub workspace: PathBuf,
    /// Comma-separated Ant-style patterns, e.g. `k8s/**/*.yaml,extra.yml`
    pub config_patterns: String,
    /// Namespace the registry pull secret is written to
    pub secret_namespace: String,
    /// Explicit pull secret name; may contain `$VAR` placeholders
    pub secret_name: Option<String>,
    /// Basis for a derived secret name, typically the build's display name
    pub secret_name_seed: Option<String>,
    pub enable_substitution: bool,
    pub mode: ApplyMode,
    pub registry_credentials: Vec<RegistryCredential>,
    pub app_code: Option<String>,
    pub tenant_code: Option<String>,
    pub project_name: Option<String>,
    pub app_manager_url: Option<String>,
    pub app_manager_credentials: Option<AppManagerCredentials>,
}

impl DeployConfig {
    /// Minimal config for `patterns` under `workspace`
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>, config_patterns: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            config_patterns: config_patterns.into(),
            secret_namespace: "default".to_string(),
            secret_name: None,
            secret_name_seed: None,
            enable_substitution: false,
            mode: ApplyMode::Apply,
            registry_credentials: Vec::new(),
            app_code: None,
            tenant_code: None,
            project_name: None,
            app_manager_url: None,
            app_manager_credentials: None,
        }
    }

    /// Check the settings a run cannot start without
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.secret_namespace.trim().is_empty() {
            return Err(DeployError::Configuration(
                "secret namespace must not be blank".to_string(),
            ));
        }
        if self.config_patterns.trim().is_empty() {
            return Err(DeployError::Configuration(
                "config file patterns must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Governance context, when app code, tenant code and project are all set
    #[must_use]
    pub fn governance(&self) -> Option<GovernanceContext> {
        GovernanceContext::from_parts(
            self.app_code.as_deref(),
            self.tenant_code.as_deref(),
            self.project_name.as_deref(),
        )
    }

    /// App-manager endpoint and login, when both are configured
    #[must_use]
    pub fn app_manager(&self) -> Option<(&str, &AppManagerCredentials)> {
        let url = self
            .app_manager_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())?;
        self.app_manager_credentials.as_ref().map(|c| (url, c))
    }
}

/// Load registry credentials from a YAML list of `{url, username, password, email}`
pub fn load_registry_credentials(path: &Path) -> Result<Vec<RegistryCredential>, DeployError> {
    let content = std::fs::read_to_string(path).map_err(|e| DeployError::io(path.display().to_string(), e))?;
    serde_yaml::from_str(&content).map_err(|e| {
        DeployError::Configuration(format!(
            "invalid registry credentials file {}: {e}",
            path.display()
        ))
    })
}

/// Process-level settings
///
/// All settings have defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Fallback log level when `RUST_LOG` is unset (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Timeout for the app-manager login call (seconds)
    pub app_manager_timeout_secs: u64,
    /// Prometheus text-file output path
    pub metrics_file: Option<PathBuf>,
    /// Record metrics at all
    pub enable_metrics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
            app_manager_timeout_secs: DEFAULT_APP_MANAGER_TIMEOUT_SECS,
            metrics_file: None,
            enable_metrics: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            app_manager_timeout_secs: env_var_or_default(
                "APP_MANAGER_TIMEOUT_SECS",
                DEFAULT_APP_MANAGER_TIMEOUT_SECS,
            ),
            metrics_file: std::env::var("METRICS_FILE")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", true),
        }
    }

    #[must_use]
    pub fn app_manager_timeout(&self) -> Duration {
        Duration::from_secs(self.app_manager_timeout_secs)
    }

    /// `tracing` filter directive for this crate at the configured level
    #[must_use]
    pub fn default_log_filter(&self) -> String {
        format!("kube_deployer={}", self.log_level.to_lowercase())
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
