//! # Manifest File Discovery
//!
//! Resolves comma-separated Ant-style patterns (`**`, `*`, `?`) against a
//! workspace directory.

use crate::error::DeployError;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Compile one Ant-style pattern into an anchored regex over `/`-separated
/// relative paths
fn pattern_to_regex(pattern: &str) -> Result<Regex, DeployError> {
    let normalized = pattern.trim().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");
    let mut expr = String::from("^");
    let mut chars = normalized.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    expr.push_str("(?:.*/)?");
                } else {
                    expr.push_str(".*");
                }
            }
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push_str("[^/]"),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr)
        .map_err(|e| DeployError::Configuration(format!("invalid file pattern '{pattern}': {e}")))
}

/// Find every file under `workspace` matching any of the comma-separated
/// `patterns`, in sorted path order
pub fn find_manifest_files(workspace: &Path, patterns: &str) -> Result<Vec<PathBuf>, DeployError> {
    let matchers = patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(pattern_to_regex)
        .collect::<Result<Vec<_>, _>>()?;

    if matchers.is_empty() {
        return Err(DeployError::Configuration(
            "no manifest file pattern configured".to_string(),
        ));
    }

    let mut found = BTreeSet::new();
    for entry in WalkDir::new(workspace).follow_links(true) {
        // an unreadable directory would otherwise surface as "no matching files"
        let entry = entry.map_err(|e| {
            let location = e
                .path()
                .unwrap_or(workspace)
                .display()
                .to_string();
            warn!(path = %location, error = %e, "Failed to scan workspace");
            DeployError::Configuration(format!("failed to scan workspace at {location}: {e}"))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(workspace) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if matchers.iter().any(|m| m.is_match(&relative)) {
            debug!(path = %relative, "matched manifest file");
            found.insert(entry.path().to_path_buf());
        }
    }

    Ok(found.into_iter().collect())
}
