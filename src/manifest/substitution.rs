//! # Variable Substitution
//!
//! Expands `$NAME` and `${NAME}` placeholders in raw manifest text before it
//! is parsed. Placeholders the resolver does not know are left untouched.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z0-9_.]+)\}|([A-Za-z0-9_]+))")
        .expect("Failed to compile placeholder regex - this should never happen")
});

/// Source of variable values for substitution
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Snapshot of environment variables, used both for manifest substitution
/// and for expanding the configured secret name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: BTreeMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Expand placeholders in `input` against these variables
    #[must_use]
    pub fn expand(&self, input: &str) -> String {
        substitute(input, self)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl VariableResolver for EnvVars {
    fn resolve(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Replace every resolvable placeholder in `content`
pub fn substitute(content: &str, resolver: &(impl VariableResolver + ?Sized)) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            resolver
                .resolve(name)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> EnvVars {
        [("IMAGE_TAG", "1.4.2"), ("BUILD_NUMBER", "17"), ("app.name", "web")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_substitute_both_placeholder_forms() {
        let out = substitute("image: repo/web:${IMAGE_TAG}-$BUILD_NUMBER", &vars());
        assert_eq!(out, "image: repo/web:1.4.2-17");
    }

    #[test]
    fn test_unresolved_placeholders_pass_through() {
        let out = substitute("value: $MISSING and ${ALSO_MISSING}", &vars());
        assert_eq!(out, "value: $MISSING and ${ALSO_MISSING}");
    }

    #[test]
    fn test_braced_form_allows_dots() {
        assert_eq!(substitute("name: ${app.name}", &vars()), "name: web");
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |name: &str| (name == "NS").then(|| "team-a".to_string());
        assert_eq!(substitute("namespace: $NS", &resolver), "namespace: team-a");
    }

    #[test]
    fn test_lone_dollar_is_kept() {
        assert_eq!(substitute("cost: $ 5", &vars()), "cost: $ 5");
    }
}
