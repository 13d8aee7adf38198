//! End-to-end deployment runs against the in-memory cluster
//!
//! Manifests are written to a temporary workspace and pushed through
//! `DeploymentTask` or `ManifestApplier` exactly as the binary does, with
//! `InMemoryResourceManager` standing in for the API server.

mod common;

use common::{registry, write_manifest, FOREIGN_NAMESPACE, NAMESPACE_AND_APP};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_deployer::authz::{NamespaceAllowSet, NamespaceGate};
use kube_deployer::config::DeployConfig;
use kube_deployer::constants::{LABEL_APP, LABEL_LOADTYPE, LABEL_POD_APP, LABEL_SERVICE_TENANT};
use kube_deployer::governance::GovernanceContext;
use kube_deployer::manifest::{find_manifest_files, EnvVars};
use kube_deployer::secrets::RegistryCredential;
use kube_deployer::updater::memory::Operation;
use kube_deployer::updater::{ApplyMode, InMemoryResourceManager, UpdateAction};
use kube_deployer::{CommandState, DeployErrorKind, DeploymentTask, ManifestApplier};
use std::sync::Arc;

fn governance() -> GovernanceContext {
    GovernanceContext::from_parts(Some("shop"), Some("acme"), Some("storefront")).unwrap()
}

fn gate(namespaces: &[&str]) -> NamespaceGate {
    NamespaceGate::Enforce(namespaces.iter().copied().collect::<NamespaceAllowSet>())
}

#[tokio::test]
async fn test_run_creates_namespace_before_workloads() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "k8s/app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new().with_endpoint("https://10.0.0.1:6443"));

    let result = DeploymentTask::new(
        DeployConfig::new(dir.path(), "k8s/**/*.yaml"),
        registry(),
        Arc::clone(&manager),
    )
    .run()
    .await;

    assert_eq!(result.command_state, CommandState::Success);
    assert_eq!(result.master_host, "https://10.0.0.1:6443");
    let kinds: Vec<&str> = result.applied.iter().map(|a| a.kind.as_str()).collect();
    assert_eq!(kinds, ["Namespace", "Deployment", "Service"]);
    assert!(result.applied.iter().all(|a| a.action == UpdateAction::Created));

    let mutations = manager.mutations();
    assert_eq!(mutations[0].kind, "Namespace");
    assert_eq!(mutations[0].namespace, None);
    assert!(manager.stored::<Namespace>(None, "team-a").is_some());
    assert!(manager.stored::<Deployment>(Some("team-a"), "web").is_some());
}

#[tokio::test]
async fn test_existing_object_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new());
    manager
        .seed(
            Some("team-a"),
            &Deployment {
                metadata: ObjectMeta {
                    name: Some("web".to_string()),
                    namespace: Some("team-a".to_string()),
                    resource_version: Some("41".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();

    let result = DeploymentTask::new(DeployConfig::new(dir.path(), "*.yaml"), registry(), Arc::clone(&manager))
        .run()
        .await;

    assert_eq!(result.command_state, CommandState::Success);
    let deployment = result.applied.iter().find(|a| a.kind == "Deployment").unwrap();
    assert_eq!(deployment.action, UpdateAction::Replaced);
    let service = result.applied.iter().find(|a| a.kind == "Service").unwrap();
    assert_eq!(service.action, UpdateAction::Created);

    let stored = manager.stored::<Deployment>(Some("team-a"), "web").unwrap();
    let image = stored.spec.unwrap().template.spec.unwrap().containers[0].image.clone();
    assert_eq!(image.as_deref(), Some("nginx:1.27"));
}

#[tokio::test]
async fn test_first_failure_aborts_run_and_leaves_earlier_objects() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new());
    manager.fail_on(Operation::Create, "Deployment", "web");

    let result = DeploymentTask::new(DeployConfig::new(dir.path(), "*.yaml"), registry(), Arc::clone(&manager))
        .run()
        .await;

    assert_eq!(result.command_state, CommandState::HasError);
    let failure = result.error.unwrap();
    assert_eq!(failure.kind, DeployErrorKind::ClusterApi);
    assert!(failure.message.contains("web"));

    // the Namespace reached the cluster before the failure and is reported
    let applied: Vec<(&str, UpdateAction)> = result
        .applied
        .iter()
        .map(|a| (a.kind.as_str(), a.action))
        .collect();
    assert_eq!(applied, [("Namespace", UpdateAction::Created)]);
    assert!(manager.stored::<Namespace>(None, "team-a").is_some());
    assert!(manager.stored::<Service>(Some("team-a"), "web").is_none());
    assert!(manager.calls().iter().all(|c| c.kind != "Service"));
}

#[tokio::test]
async fn test_delete_mode_treats_missing_objects_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new());
    manager
        .seed(
            None,
            &Namespace {
                metadata: ObjectMeta {
                    name: Some("team-a".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();

    let mut config = DeployConfig::new(dir.path(), "*.yaml");
    config.mode = ApplyMode::Delete;
    let result = DeploymentTask::new(config, registry(), Arc::clone(&manager)).run().await;

    assert_eq!(result.command_state, CommandState::Success);
    let actions: Vec<(&str, UpdateAction)> = result
        .applied
        .iter()
        .map(|a| (a.kind.as_str(), a.action))
        .collect();
    assert_eq!(
        actions,
        [
            ("Namespace", UpdateAction::Deleted),
            ("Deployment", UpdateAction::Absent),
            ("Service", UpdateAction::Absent),
        ]
    );
    assert!(manager.stored::<Namespace>(None, "team-a").is_none());
    assert!(manager
        .mutations()
        .iter()
        .all(|c| c.operation == Operation::Delete));
}

#[tokio::test]
async fn test_unknown_kinds_and_empty_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "a-empty.yaml", "---\n");
    write_manifest(
        dir.path(),
        "b-custom.yaml",
        "apiVersion: example.com/v1\nkind: Widget\nmetadata:\n  name: gadget\n  namespace: team-a\n",
    );
    write_manifest(dir.path(), "c-settings.yaml", FOREIGN_NAMESPACE);
    let manager = Arc::new(InMemoryResourceManager::new());

    let result = DeploymentTask::new(DeployConfig::new(dir.path(), "*.yaml"), registry(), Arc::clone(&manager))
        .run()
        .await;

    assert_eq!(result.command_state, CommandState::Success);
    assert_eq!(result.applied.len(), 1);
    assert_eq!(result.applied[0].kind, "ConfigMap");
    assert!(manager.stored::<ConfigMap>(Some("kube-system"), "settings").is_some());
}

#[tokio::test]
async fn test_substitution_and_pull_secret_export() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "deploy.yaml",
        r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: api
  namespace: team-a
spec:
  selector:
    matchLabels:
      app: api
  template:
    metadata:
      labels:
        app: api
    spec:
      imagePullSecrets:
        - name: $KUBERNETES_SECRET_NAME
      containers:
        - name: api
          image: registry.example.com/api:${IMAGE_TAG}
"#,
    );
    let manager = Arc::new(InMemoryResourceManager::new());

    let mut config = DeployConfig::new(dir.path(), "*.yaml");
    config.enable_substitution = true;
    config.secret_namespace = "team-a".to_string();
    config.secret_name = Some("registry-$BUILD_NUMBER".to_string());
    config.registry_credentials = vec![RegistryCredential::new(
        Some("https://registry.example.com"),
        "ci",
        "s3cret",
    )];
    let env: EnvVars = [("IMAGE_TAG", "2.0.1"), ("BUILD_NUMBER", "17")]
        .into_iter()
        .collect();

    let result = DeploymentTask::new(config, registry(), Arc::clone(&manager))
        .with_env(env)
        .run()
        .await;

    assert_eq!(result.command_state, CommandState::Success, "{:?}", result.error);
    assert_eq!(
        result.extra_env_vars.get("KUBERNETES_SECRET_NAME").map(String::as_str),
        Some("registry-17")
    );
    assert_eq!(result.applied[0].kind, "Secret");

    let secret = manager.stored::<Secret>(Some("team-a"), "registry-17").unwrap();
    assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/dockercfg"));
    assert!(secret.string_data.unwrap().contains_key(".dockercfg"));

    let pod = manager
        .stored::<Deployment>(Some("team-a"), "api")
        .unwrap()
        .spec
        .unwrap()
        .template
        .spec
        .unwrap();
    assert_eq!(
        serde_json::to_value(&pod.image_pull_secrets).unwrap(),
        serde_json::json!([{ "name": "registry-17" }])
    );
    assert_eq!(
        pod.containers[0].image.as_deref(),
        Some("registry.example.com/api:2.0.1")
    );
}

#[tokio::test]
async fn test_derived_secret_name_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "settings.yaml", FOREIGN_NAMESPACE);
    let manager = Arc::new(InMemoryResourceManager::new());

    let mut config = DeployConfig::new(dir.path(), "*.yaml");
    config.secret_name_seed = Some("Storefront Build #12".to_string());
    config.registry_credentials = vec![RegistryCredential::new(None, "ci", "s3cret")];

    let result = DeploymentTask::new(config, registry(), Arc::clone(&manager)).run().await;

    assert_eq!(result.command_state, CommandState::Success);
    let name = &result.extra_env_vars["KUBERNETES_SECRET_NAME"];
    assert!(name.starts_with("pull-secret-storefront-build--12"));
    assert!(name.len() <= 63);
    assert!(kube_deployer::secrets::validate_name(name).is_ok());
    assert!(manager.stored::<Secret>(Some("default"), name).is_some());
}

#[tokio::test]
async fn test_governed_apply_labels_workloads_and_services() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new());
    let applier = ManifestApplier::new(registry(), Arc::clone(&manager))
        .with_governance(governance(), gate(&["team-a"]));

    let files = find_manifest_files(dir.path(), "*.yaml").unwrap();
    let applied = applier.apply_files(&files).await.unwrap();
    assert_eq!(applied.len(), 3);

    let deployment = manager.stored::<Deployment>(Some("team-a"), "web").unwrap();
    let labels = deployment.metadata.labels.unwrap();
    assert_eq!(labels[LABEL_APP], "shop");
    assert_eq!(labels[LABEL_LOADTYPE], "Deployment");

    let spec = deployment.spec.unwrap();
    let selector = spec.selector.match_labels.unwrap();
    let template = spec.template.metadata.unwrap().labels.unwrap();
    assert_eq!(selector[LABEL_POD_APP], "web");
    assert_eq!(selector["app"], "web");
    assert!(selector.iter().all(|(k, v)| template.get(k) == Some(v)));

    let service = manager.stored::<Service>(Some("team-a"), "web").unwrap();
    assert_eq!(service.metadata.labels.unwrap()[LABEL_SERVICE_TENANT], "acme");

    // Namespaces are never labeled
    let namespace = manager.stored::<Namespace>(None, "team-a").unwrap();
    assert!(namespace.metadata.labels.is_none());
}

#[tokio::test]
async fn test_governed_apply_rejects_foreign_namespace_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "settings.yaml", FOREIGN_NAMESPACE);
    let manager = Arc::new(InMemoryResourceManager::new());
    let applier = ManifestApplier::new(registry(), Arc::clone(&manager))
        .with_governance(governance(), gate(&["team-a", "team-b"]));

    let files = find_manifest_files(dir.path(), "*.yaml").unwrap();
    let err = applier.apply_files(&files).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Authorization);
    assert!(err.to_string().contains("kube-system"));
    assert!(manager.calls().is_empty());
}

#[tokio::test]
async fn test_governed_apply_stops_at_unauthorized_resource() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new());
    let applier = ManifestApplier::new(registry(), Arc::clone(&manager))
        .with_governance(governance(), gate(&["team-b"]));

    let files = find_manifest_files(dir.path(), "*.yaml").unwrap();
    let err = applier.apply_files(&files).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Authorization);
    // the Namespace itself bypasses the gate
    let mutated: Vec<String> = manager.mutations().into_iter().map(|c| c.kind).collect();
    assert_eq!(mutated, ["Namespace"]);
}

#[tokio::test]
async fn test_cancelled_run_reports_interrupted() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "app.yaml", NAMESPACE_AND_APP);
    let manager = Arc::new(InMemoryResourceManager::new());
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    cancel_tx.send_replace(true);

    let result = DeploymentTask::new(DeployConfig::new(dir.path(), "*.yaml"), registry(), Arc::clone(&manager))
        .with_cancellation(cancel_rx)
        .run()
        .await;

    assert_eq!(result.command_state, CommandState::HasError);
    assert_eq!(result.error.map(|e| e.kind), Some(DeployErrorKind::Interrupted));
    assert!(manager.calls().is_empty());
}
