//! # Manifest Loader
//!
//! Turns a manifest file into an ordered list of [`ManifestDocument`]s.
//!
//! Substitution runs on the raw text before any YAML parsing, so placeholders
//! may appear anywhere, including in keys and `kind`. Empty documents (a bare
//! `---`) are dropped; a file with no documents is valid and yields an empty
//! list.

pub mod files;
pub mod substitution;

pub use files::find_manifest_files;
pub use substitution::{substitute, EnvVars, VariableResolver};

use crate::error::DeployError;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One decoded resource from a manifest file
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    /// The full document; `spec` and friends stay opaque until a typed
    /// updater decodes them
    pub body: serde_json::Value,
    /// `<file>#<index>` for diagnostics
    pub source: String,
}

impl ManifestDocument {
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Core `v1` Namespace objects are applied ahead of everything else
    #[must_use]
    pub fn is_namespace(&self) -> bool {
        self.kind == "Namespace" && self.api_version == "v1"
    }

    /// Wrap an object built in code so it can go through the same updater
    /// path as a parsed manifest
    pub fn from_resource<K>(resource: &K, source: &str) -> Result<Self, DeployError>
    where
        K: kube::Resource<DynamicType = ()> + Serialize,
    {
        let mut body = serde_json::to_value(resource)
            .map_err(|e| DeployError::invalid_manifest(source, e))?;
        if let Some(map) = body.as_object_mut() {
            map.insert("apiVersion".to_string(), K::api_version(&()).into());
            map.insert("kind".to_string(), K::kind(&()).into());
        }
        Ok(Self {
            api_version: K::api_version(&()).to_string(),
            kind: K::kind(&()).to_string(),
            metadata: resource.meta().clone(),
            body,
            source: source.to_string(),
        })
    }

    /// Decode into a typed model
    pub fn decode<K: DeserializeOwned>(&self) -> Result<K, DeployError> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            DeployError::invalid_manifest(
                &self.source,
                format!("not a valid {} {}: {e}", self.api_version, self.kind),
            )
        })
    }
}

fn required_str(
    body: &serde_json::Value,
    field: &str,
    source: &str,
) -> Result<String, DeployError> {
    body.get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DeployError::invalid_manifest(source, format!("missing '{field}'")))
}

/// Parse a multi-document YAML stream
pub fn parse_documents(content: &str, source_name: &str) -> Result<Vec<ManifestDocument>, DeployError> {
    let mut documents = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let source = format!("{source_name}#{index}");
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| DeployError::invalid_manifest(&source, e))?;

        if value.is_null() {
            debug!(source = %source, "skipping empty document");
            continue;
        }
        if !value.is_mapping() {
            return Err(DeployError::invalid_manifest(
                &source,
                "document is not a mapping",
            ));
        }

        let body = serde_json::to_value(&value)
            .map_err(|e| DeployError::invalid_manifest(&source, e))?;
        let api_version = required_str(&body, "apiVersion", &source)?;
        let kind = required_str(&body, "kind", &source)?;
        let metadata = match body.get("metadata") {
            Some(meta) if !meta.is_null() => serde_json::from_value::<ObjectMeta>(meta.clone())
                .map_err(|e| DeployError::invalid_manifest(&source, format!("bad metadata: {e}")))?,
            _ => ObjectMeta::default(),
        };

        documents.push(ManifestDocument {
            api_version,
            kind,
            metadata,
            body,
            source,
        });
    }

    Ok(documents)
}

/// Read, substitute and parse one manifest file
pub async fn load_documents(
    path: &Path,
    resolver: Option<&dyn VariableResolver>,
) -> Result<Vec<ManifestDocument>, DeployError> {
    info!(path = %path.display(), "Loading configuration");
    let source_name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DeployError::io(path.display().to_string(), e))?;
    let raw = String::from_utf8(bytes)
        .map_err(|e| DeployError::invalid_manifest(&source_name, format!("not valid UTF-8: {e}")))?;

    let content = match resolver {
        Some(resolver) => substitute(&raw, resolver),
        None => raw,
    };
    parse_documents(&content, &source_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::Deployment;

    const TWO_DOCS: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: team-a
  labels:
    tier: frontend
spec:
  selector:
    matchLabels:
      app: web
  template:
    metadata:
      labels:
        app: web
    spec:
      containers:
        - name: web
          image: nginx:1.27
---
---
apiVersion: v1
kind: Namespace
metadata:
  name: team-a
"#;

    #[test]
    fn test_parse_multi_document_stream_in_order() {
        let docs = parse_documents(TWO_DOCS, "app.yaml").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind, "Deployment");
        assert_eq!(docs[0].name(), "web");
        assert_eq!(docs[0].namespace(), Some("team-a"));
        assert!(docs[1].is_namespace());
        assert_eq!(docs[1].namespace(), None);
    }

    #[test]
    fn test_empty_stream_is_valid() {
        assert!(parse_documents("", "empty.yaml").unwrap().is_empty());
        assert!(parse_documents("---\n---\n", "empty.yaml").unwrap().is_empty());
    }

    #[test]
    fn test_missing_kind_is_invalid_manifest() {
        let err = parse_documents("apiVersion: v1\nmetadata:\n  name: x\n", "bad.yaml").unwrap_err();
        assert!(matches!(err, DeployError::InvalidManifest { .. }));
        assert!(err.to_string().contains("kind"));
    }

    #[test]
    fn test_malformed_yaml_is_invalid_manifest() {
        let err = parse_documents("kind: [unclosed\n", "bad.yaml").unwrap_err();
        assert!(matches!(err, DeployError::InvalidManifest { .. }));
    }

    #[test]
    fn test_scalar_document_is_invalid_manifest() {
        let err = parse_documents("just a string\n", "bad.yaml").unwrap_err();
        assert!(matches!(err, DeployError::InvalidManifest { .. }));
    }

    #[test]
    fn test_decode_typed_and_reject_wrong_shape() {
        let docs = parse_documents(TWO_DOCS, "app.yaml").unwrap();
        let deployment: Deployment = docs[0].decode().unwrap();
        assert_eq!(deployment.metadata.name.as_deref(), Some("web"));

        let broken = parse_documents(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: x\nspec:\n  replicas: many\n",
            "broken.yaml",
        )
        .unwrap();
        let err = broken[0].decode::<Deployment>().unwrap_err();
        assert!(matches!(err, DeployError::InvalidManifest { .. }));
    }

    #[tokio::test]
    async fn test_load_documents_substitutes_before_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cm.yaml");
        std::fs::write(
            &path,
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${NAME}\n  namespace: $NS\n",
        )
        .unwrap();

        let vars: EnvVars = [("NAME", "settings")].into_iter().collect();
        let docs = load_documents(&path, Some(&vars)).await.unwrap();
        assert_eq!(docs[0].name(), "settings");
        // $NS is unresolved and survives verbatim
        assert_eq!(docs[0].namespace(), Some("$NS"));

        let docs = load_documents(&path, None).await.unwrap();
        assert_eq!(docs[0].name(), "${NAME}");
    }

    #[tokio::test]
    async fn test_load_documents_rejects_non_utf8_as_invalid_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.yaml");
        std::fs::write(&path, b"\xff\xfe").unwrap();

        let err = load_documents(&path, None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::DeployErrorKind::InvalidManifest);
        assert!(err.to_string().contains("binary.yaml"));
    }
}
