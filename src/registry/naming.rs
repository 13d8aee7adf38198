//! # Model Naming
//!
//! Derives `(group, version, kind)` from a generated model name such as
//! `AppsV1Deployment` or `AutoscalingV2beta2HorizontalPodAutoscaler`, and the
//! reverse.
//!
//! The name is `<Group><Version><Kind>`; the group is absent for the core
//! group (`V1ConfigMap`). Group and version prefixes are tried in a fixed
//! order, first match wins.

/// Model-name group prefix and the API group it stands for
pub const GROUP_PREFIXES: &[(&str, &str)] = &[
    ("Admissionregistration", "admissionregistration.k8s.io"),
    ("Apiextensions", "apiextensions.k8s.io"),
    ("Apiregistration", "apiregistration.k8s.io"),
    ("Apps", "apps"),
    ("Authentication", "authentication.k8s.io"),
    ("Authorization", "authorization.k8s.io"),
    ("Autoscaling", "autoscaling"),
    ("Extensions", "extensions"),
    ("Batch", "batch"),
    ("Certificates", "certificates.k8s.io"),
    ("Networking", "networking.k8s.io"),
    ("Policy", "policy"),
    ("RbacAuthorization", "rbac.authorization.k8s.io"),
    ("Scheduling", "scheduling.k8s.io"),
    ("Settings", "settings.k8s.io"),
    ("Storage", "storage.k8s.io"),
];

/// Version prefixes; order matters since `V2` is a prefix of `V2beta1`
pub const VERSION_PREFIXES: &[&str] = &[
    "V2beta1", "V2beta2", "V2alpha1", "V2", "V1beta2", "V1beta1", "V1alpha1", "V1",
];

/// Decomposed model name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelName {
    /// Empty for the core group
    pub group: String,
    /// Empty if no version prefix matched
    pub version: String,
    pub kind: String,
}

impl ModelName {
    /// `group/version`, or just `version` for the core group
    #[must_use]
    pub fn api_version(&self) -> String {
        match (self.group.is_empty(), self.version.is_empty()) {
            (true, _) => self.version.clone(),
            (false, true) => format!("{}/", self.group),
            (false, false) => format!("{}/{}", self.group, self.version),
        }
    }
}

fn split_group(name: &str) -> (Option<&'static str>, &str) {
    GROUP_PREFIXES
        .iter()
        .find_map(|(prefix, group)| name.strip_prefix(prefix).map(|rest| (Some(*group), rest)))
        .unwrap_or((None, name))
}

fn split_version(name: &str) -> (Option<String>, &str) {
    VERSION_PREFIXES
        .iter()
        .find_map(|prefix| {
            name.strip_prefix(prefix)
                .map(|rest| (Some(prefix.to_lowercase()), rest))
        })
        .unwrap_or((None, name))
}

/// Split a model name into group, version and kind
#[must_use]
pub fn parse_model_name(name: &str) -> ModelName {
    let (group, rest) = split_group(name);
    let (version, kind) = split_version(rest);
    ModelName {
        group: group.unwrap_or_default().to_string(),
        version: version.unwrap_or_default(),
        kind: kind.to_string(),
    }
}

/// Reverse of [`parse_model_name`]
///
/// Returns `None` when the group or version has no prefix in the tables.
#[must_use]
pub fn model_name(group: &str, version: &str, kind: &str) -> Option<String> {
    let group_prefix = if group.is_empty() {
        ""
    } else {
        GROUP_PREFIXES
            .iter()
            .find(|(_, g)| *g == group)
            .map(|(prefix, _)| *prefix)?
    };
    let version_prefix = VERSION_PREFIXES
        .iter()
        .find(|v| v.to_lowercase() == version)?;
    Some(format!("{group_prefix}{version_prefix}{kind}"))
}
