//! # Governance
//!
//! Tenancy and ownership labeling for workloads deployed on behalf of the
//! app-manager platform.
//!
//! Governance is opt-in per run: it is active only when the app code, tenant
//! code and project name are all supplied. When active, every resource other
//! than a Namespace passes the namespace gate ([`crate::authz`]) and then gets
//! labeled here before it reaches the updater.

pub mod inject;
pub mod labels;

use std::fmt;
use tracing::warn;

/// Ownership metadata for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceContext {
    pub app_code: String,
    pub tenant_code: String,
    pub project_name: String,
}

impl GovernanceContext {
    /// Build a context when all three identifiers are present and non-blank
    ///
    /// A partial set is logged and treated as "no governance".
    #[must_use]
    pub fn from_parts(
        app_code: Option<&str>,
        tenant_code: Option<&str>,
        project_name: Option<&str>,
    ) -> Option<Self> {
        let clean = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        match (clean(app_code), clean(tenant_code), clean(project_name)) {
            (Some(app_code), Some(tenant_code), Some(project_name)) => Some(Self {
                app_code,
                tenant_code,
                project_name,
            }),
            (None, None, None) => None,
            _ => {
                warn!(
                    "Governance metadata is incomplete (app code, tenant code and project name are all required); labeling and namespace checks are disabled"
                );
                None
            }
        }
    }
}

/// Workload load types known to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    StatefulSet,
    Deployment,
    Job,
    CronJob,
}

impl LoadType {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            LoadType::StatefulSet => "StatefulSet",
            LoadType::Deployment => "Deployment",
            LoadType::Job => "Job",
            LoadType::CronJob => "CronJob",
        }
    }

    /// Exact, case-sensitive match on the load type code
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "StatefulSet" => Some(LoadType::StatefulSet),
            "Deployment" => Some(LoadType::Deployment),
            "Job" => Some(LoadType::Job),
            "CronJob" => Some(LoadType::CronJob),
            _ => None,
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_requires_all_three_parts() {
        let ctx = GovernanceContext::from_parts(Some("shop"), Some("acme"), Some("retail")).unwrap();
        assert_eq!(ctx.app_code, "shop");
        assert!(GovernanceContext::from_parts(None, None, None).is_none());
        assert!(GovernanceContext::from_parts(Some("shop"), None, Some("retail")).is_none());
        assert!(GovernanceContext::from_parts(Some("shop"), Some("  "), Some("retail")).is_none());
    }

    #[test]
    fn test_load_type_codes_round_trip() {
        for lt in [
            LoadType::StatefulSet,
            LoadType::Deployment,
            LoadType::Job,
            LoadType::CronJob,
        ] {
            assert_eq!(LoadType::from_code(lt.code()), Some(lt));
        }
        assert_eq!(LoadType::from_code("deployment"), None);
        assert_eq!(LoadType::from_code("DaemonSet"), None);
    }
}
