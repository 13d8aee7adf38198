//! Secret name derivation for the registry pull secret.

use crate::constants::{
    KUBERNETES_NAME_LENGTH_LIMIT, KUBERNETES_NAME_PATTERN, KUBERNETES_SECRET_NAME_PREFIX,
    SECRET_NAME_RANDOM_SUFFIX_LENGTH,
};
use crate::error::DeployError;
use crate::manifest::EnvVars;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(KUBERNETES_NAME_PATTERN)
        .expect("Failed to compile Kubernetes name regex - this should never happen")
});

/// Letter that replaces a trailing `-` so the name ends alphanumeric
const TRAILING_REPLACEMENT: char = 'a';

/// Validate a user-supplied secret name
pub fn validate_name(name: &str) -> Result<(), DeployError> {
    if name.len() > KUBERNETES_NAME_LENGTH_LIMIT {
        return Err(DeployError::InvalidName {
            name: name.to_string(),
            message: format!("longer than {KUBERNETES_NAME_LENGTH_LIMIT} characters"),
        });
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(DeployError::InvalidName {
            name: name.to_string(),
            message: format!("must match {KUBERNETES_NAME_PATTERN}"),
        });
    }
    Ok(())
}

/// Derive the pull secret name using the thread-local RNG for the suffix
pub fn derive_name(
    configured: Option<&str>,
    default_seed: Option<&str>,
    env: &EnvVars,
) -> Result<String, DeployError> {
    derive_name_with(configured, default_seed, env, &mut rand::thread_rng())
}

/// Derive the pull secret name
///
/// A configured name (after variable expansion and trimming) is validated
/// and returned as is. Otherwise the name is built from `default_seed`, or a
/// random UUID when the seed is blank: non-alphanumerics become `-`, the
/// result is lowercased, prefixed, truncated to the length limit and given a
/// random suffix of up to eight characters.
pub fn derive_name_with<R: Rng + ?Sized>(
    configured: Option<&str>,
    default_seed: Option<&str>,
    env: &EnvVars,
    rng: &mut R,
) -> Result<String, DeployError> {
    let expanded = env.expand(configured.unwrap_or_default());
    let name = expanded.trim();
    if !name.is_empty() {
        validate_name(name)?;
        return Ok(name.to_string());
    }

    let seed = match default_seed.map(str::trim).filter(|s| !s.is_empty()) {
        Some(seed) => seed.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };
    let sanitized: String = seed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();

    let mut name = format!("{KUBERNETES_SECRET_NAME_PREFIX}{sanitized}");
    name.truncate(KUBERNETES_NAME_LENGTH_LIMIT);

    let suffix_length = (KUBERNETES_NAME_LENGTH_LIMIT - name.len()).min(SECRET_NAME_RANDOM_SUFFIX_LENGTH);
    name.extend(
        rng.sample_iter(&Alphanumeric)
            .take(suffix_length)
            .map(|b| char::from(b).to_ascii_lowercase()),
    );

    if name.ends_with('-') {
        name.pop();
        name.push(TRAILING_REPLACEMENT);
    }

    debug!(name = %name, "Derived secret name");
    Ok(name)
}
