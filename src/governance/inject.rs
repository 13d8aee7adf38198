//! # Governance Injection
//!
//! Per-kind label/annotation injection. Each function takes the decoded
//! object by value and returns the labeled object; metadata maps are rebuilt
//! from the merged copy rather than edited in place.

use super::labels::{
    autoscaler_labels, ingress_labels, merge_labels, pod_labels, secret_annotations,
    service_labels, workload_labels, Labels,
};
use super::{GovernanceContext, LoadType};
use crate::constants::{LABEL_POD_APP, LABEL_POD_LOADTYPE};
use crate::error::DeployError;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::{v1 as autoscaling_v1, v2 as autoscaling_v2};
use k8s_openapi::api::core::v1::{PodTemplateSpec, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

fn workload_name(kind: &str, meta: &ObjectMeta) -> Result<String, DeployError> {
    meta.name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| DeployError::governance(kind, "", "workload has no metadata.name"))
}

/// Write the derived pod labels and the workload labels into both the pod
/// template and the selector, then verify the selector still matches
fn label_workload_pods(
    kind: &str,
    name: &str,
    template: &mut PodTemplateSpec,
    selector: &mut LabelSelector,
    pod: &Labels,
    workload: &Labels,
) -> Result<(), DeployError> {
    let template_meta = template.metadata.get_or_insert_with(ObjectMeta::default);
    template_meta.labels = Some(merge_labels(template_meta.labels.as_ref(), &[pod, workload]));
    selector.match_labels = Some(merge_labels(selector.match_labels.as_ref(), &[pod, workload]));

    let template_labels = template_meta.labels.as_ref();
    let mismatched: Vec<&String> = selector
        .match_labels
        .iter()
        .flatten()
        .filter(|(k, v)| template_labels.and_then(|t| t.get(*k)) != Some(*v))
        .map(|(k, _)| k)
        .collect();

    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(DeployError::governance(
            kind,
            name,
            format!("selector labels {mismatched:?} do not match the pod template labels"),
        ))
    }
}

pub fn deployment(mut deployment: Deployment, ctx: &GovernanceContext) -> Result<Deployment, DeployError> {
    let name = workload_name("Deployment", &deployment.metadata)?;
    let workload = workload_labels(&ctx.app_code, LoadType::Deployment);
    let pod = pod_labels(&name, &ctx.tenant_code, LoadType::Deployment);

    deployment.metadata.labels = Some(merge_labels(deployment.metadata.labels.as_ref(), &[&workload]));
    let spec = deployment.spec.get_or_insert_with(Default::default);
    label_workload_pods(
        "Deployment",
        &name,
        &mut spec.template,
        &mut spec.selector,
        &pod,
        &workload,
    )?;
    Ok(deployment)
}

pub fn stateful_set(mut stateful_set: StatefulSet, ctx: &GovernanceContext) -> Result<StatefulSet, DeployError> {
    let name = workload_name("StatefulSet", &stateful_set.metadata)?;
    let workload = workload_labels(&ctx.app_code, LoadType::StatefulSet);
    let pod = pod_labels(&name, &ctx.tenant_code, LoadType::StatefulSet);

    stateful_set.metadata.labels = Some(merge_labels(stateful_set.metadata.labels.as_ref(), &[&workload]));
    let spec = stateful_set.spec.get_or_insert_with(Default::default);
    label_workload_pods(
        "StatefulSet",
        &name,
        &mut spec.template,
        &mut spec.selector,
        &pod,
        &workload,
    )?;
    Ok(stateful_set)
}

/// Services must already select a labeled workload: the selector has to carry
/// `appmgr-pod-app` and a known `appmgr-pod-loadType`
pub fn service(mut service: Service, ctx: &GovernanceContext) -> Result<Service, DeployError> {
    let name = service.metadata.name.clone().unwrap_or_default();
    let selector = service.spec.as_ref().and_then(|s| s.selector.as_ref());

    let pod_app = selector
        .and_then(|s| s.get(LABEL_POD_APP))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            DeployError::governance("Service", &name, format!("selector has no {LABEL_POD_APP}"))
        })?
        .clone();
    let load_type_code = selector
        .and_then(|s| s.get(LABEL_POD_LOADTYPE))
        .map(String::as_str)
        .unwrap_or_default();
    let load_type = LoadType::from_code(load_type_code).ok_or_else(|| {
        DeployError::governance(
            "Service",
            &name,
            format!("unknown {LABEL_POD_LOADTYPE} '{load_type_code}' in selector"),
        )
    })?;

    let labels = service_labels(&pod_app, load_type, &ctx.tenant_code, &ctx.project_name);
    service.metadata.labels = Some(merge_labels(service.metadata.labels.as_ref(), &[&labels]));
    Ok(service)
}

/// Secrets are marked as key-value secrets; the type annotations overwrite
/// whatever the manifest set for them, other annotations are kept
pub fn secret(mut secret: Secret, _ctx: &GovernanceContext) -> Result<Secret, DeployError> {
    let markers = secret_annotations();
    secret.metadata.annotations = Some(merge_labels(secret.metadata.annotations.as_ref(), &[&markers]));
    Ok(secret)
}

pub fn ingress(mut ingress: Ingress, ctx: &GovernanceContext) -> Result<Ingress, DeployError> {
    let labels = ingress_labels(&ctx.tenant_code, &ctx.project_name);
    ingress.metadata.labels = Some(merge_labels(ingress.metadata.labels.as_ref(), &[&labels]));
    Ok(ingress)
}

fn autoscaler_metadata(
    meta: &ObjectMeta,
    target_kind: Option<&str>,
    ctx: &GovernanceContext,
) -> Result<Labels, DeployError> {
    let name = meta.name.clone().unwrap_or_default();
    let target_kind = target_kind.unwrap_or_default();
    let load_type = LoadType::from_code(target_kind).ok_or_else(|| {
        DeployError::governance(
            "HorizontalPodAutoscaler",
            &name,
            format!("scale target kind '{target_kind}' is not a known load type"),
        )
    })?;
    let labels = autoscaler_labels(&ctx.app_code, load_type, &ctx.tenant_code, &ctx.project_name);
    Ok(merge_labels(meta.labels.as_ref(), &[&labels]))
}

pub fn autoscaler_v2(
    mut hpa: autoscaling_v2::HorizontalPodAutoscaler,
    ctx: &GovernanceContext,
) -> Result<autoscaling_v2::HorizontalPodAutoscaler, DeployError> {
    let target_kind = hpa.spec.as_ref().map(|s| s.scale_target_ref.kind.as_str());
    hpa.metadata.labels = Some(autoscaler_metadata(&hpa.metadata, target_kind, ctx)?);
    Ok(hpa)
}

pub fn autoscaler_v1(
    mut hpa: autoscaling_v1::HorizontalPodAutoscaler,
    ctx: &GovernanceContext,
) -> Result<autoscaling_v1::HorizontalPodAutoscaler, DeployError> {
    let target_kind = hpa.spec.as_ref().map(|s| s.scale_target_ref.kind.as_str());
    hpa.metadata.labels = Some(autoscaler_metadata(&hpa.metadata, target_kind, ctx)?);
    Ok(hpa)
}
