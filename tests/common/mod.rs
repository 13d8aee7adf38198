//! Common test utilities for integration tests
//!
//! Provides rustls initialization and manifest fixtures on disk.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::path::Path;
use std::sync::{Arc, Once};

use kube_deployer::registry::ResourceRegistry;
use kube_deployer::updater::InMemoryResourceManager;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` so it runs a single time across all tests in a binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Write `content` to `dir/name`, creating parent directories
pub fn write_manifest(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    std::fs::write(path, content).expect("Failed to write fixture manifest");
}

pub fn registry() -> Arc<ResourceRegistry<InMemoryResourceManager>> {
    Arc::new(ResourceRegistry::new().expect("Failed to build resource registry"))
}

pub const NAMESPACE_AND_APP: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: team-a
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
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: team-a
spec:
  selector:
    appmgr-pod-app: web
    appmgr-pod-loadType: Deployment
  ports:
    - port: 80
---
apiVersion: v1
kind: Namespace
metadata:
  name: team-a
"#;

pub const FOREIGN_NAMESPACE: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: kube-system
data:
  key: value
"#;
