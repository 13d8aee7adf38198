//! # Governance Labels
//!
//! Builders for the fixed label vocabulary. Every builder returns a fresh map;
//! callers merge it into a copy of the object's metadata with
//! [`merge_labels`].

use super::LoadType;
use crate::constants::{
    ANNOTATION_MLOG_SECRET_TYPE, ANNOTATION_SECRET_TYPE, LABEL_APP, LABEL_AUTOSCALER_APP,
    LABEL_AUTOSCALER_LOADTYPE, LABEL_AUTOSCALER_PROJECT, LABEL_AUTOSCALER_TENANT,
    LABEL_INGRESS_PROJECT, LABEL_INGRESS_TENANT, LABEL_LOADTYPE, LABEL_POD_APP,
    LABEL_POD_DEPLOYMENT, LABEL_POD_LOADTYPE, LABEL_POD_STATEFULSET, LABEL_POD_TENANT,
    LABEL_SERVICE_APP, LABEL_SERVICE_PROJECT, LABEL_SERVICE_TENANT, SECRET_TYPE_KEY_VALUE,
};
use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, String>;

fn labels<const N: usize>(pairs: [(&str, &str); N]) -> Labels {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Merge `overlays` onto a copy of `base`, later maps winning on conflicts
#[must_use]
pub fn merge_labels(base: Option<&Labels>, overlays: &[&Labels]) -> Labels {
    let mut merged = base.cloned().unwrap_or_default();
    for overlay in overlays {
        merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Workload-level labels: owning app and load type
#[must_use]
pub fn workload_labels(app_code: &str, load_type: LoadType) -> Labels {
    labels([(LABEL_APP, app_code), (LABEL_LOADTYPE, load_type.code())])
}

/// Pod-template labels derived from the workload; the same map goes into the
/// selector so the selector always matches the template
#[must_use]
pub fn pod_labels(workload_name: &str, tenant_code: &str, load_type: LoadType) -> Labels {
    let mut pod = labels([
        (LABEL_POD_LOADTYPE, load_type.code()),
        (LABEL_POD_APP, workload_name),
        (LABEL_POD_TENANT, tenant_code),
    ]);
    match load_type {
        LoadType::Deployment => {
            pod.insert(LABEL_POD_DEPLOYMENT.to_string(), workload_name.to_string());
        }
        LoadType::StatefulSet => {
            pod.insert(LABEL_POD_STATEFULSET.to_string(), workload_name.to_string());
        }
        LoadType::Job | LoadType::CronJob => {}
    }
    pod
}

/// Service labels; `pod_app` comes from the Service's selector
#[must_use]
pub fn service_labels(
    pod_app: &str,
    load_type: LoadType,
    tenant_code: &str,
    project_name: &str,
) -> Labels {
    labels([
        (LABEL_POD_APP, pod_app),
        (LABEL_SERVICE_APP, pod_app),
        (LABEL_POD_LOADTYPE, load_type.code()),
        (LABEL_SERVICE_TENANT, tenant_code),
        (LABEL_SERVICE_PROJECT, project_name),
    ])
}

#[must_use]
pub fn ingress_labels(tenant_code: &str, project_name: &str) -> Labels {
    labels([
        (LABEL_INGRESS_TENANT, tenant_code),
        (LABEL_INGRESS_PROJECT, project_name),
    ])
}

#[must_use]
pub fn autoscaler_labels(
    app_code: &str,
    load_type: LoadType,
    tenant_code: &str,
    project_name: &str,
) -> Labels {
    labels([
        (LABEL_AUTOSCALER_APP, app_code),
        (LABEL_AUTOSCALER_LOADTYPE, load_type.code()),
        (LABEL_AUTOSCALER_TENANT, tenant_code),
        (LABEL_AUTOSCALER_PROJECT, project_name),
    ])
}

/// Annotations every governed Secret carries
#[must_use]
pub fn secret_annotations() -> Labels {
    labels([
        (ANNOTATION_SECRET_TYPE, SECRET_TYPE_KEY_VALUE),
        (ANNOTATION_MLOG_SECRET_TYPE, SECRET_TYPE_KEY_VALUE),
    ])
}

/// Label selector string for finding the autoscalers of an app
///
/// Returns `None` when neither part is given.
#[must_use]
pub fn autoscaler_label_selector(app: Option<&str>, load_type: Option<&str>) -> Option<String> {
    let parts: Vec<String> = [
        app.filter(|a| !a.is_empty())
            .map(|a| format!("{LABEL_AUTOSCALER_APP}={a}")),
        load_type
            .filter(|l| !l.is_empty())
            .map(|l| format!("{LABEL_AUTOSCALER_LOADTYPE}={l}")),
    ]
    .into_iter()
    .flatten()
    .collect();

    (!parts.is_empty()).then(|| parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_does_not_touch_base() {
        let base = labels([("tier", "web"), (LABEL_APP, "old")]);
        let overlay = workload_labels("shop", LoadType::Deployment);
        let merged = merge_labels(Some(&base), &[&overlay]);

        assert_eq!(merged.get("tier").map(String::as_str), Some("web"));
        assert_eq!(merged.get(LABEL_APP).map(String::as_str), Some("shop"));
        assert_eq!(base.get(LABEL_APP).map(String::as_str), Some("old"));
    }

    #[test]
    fn test_pod_labels_per_load_type() {
        let dep = pod_labels("web", "acme", LoadType::Deployment);
        assert_eq!(dep.get(LABEL_POD_DEPLOYMENT).map(String::as_str), Some("web"));
        assert!(!dep.contains_key(LABEL_POD_STATEFULSET));

        let sts = pod_labels("db", "acme", LoadType::StatefulSet);
        assert_eq!(sts.get(LABEL_POD_STATEFULSET).map(String::as_str), Some("db"));
        assert_eq!(sts.get(LABEL_POD_LOADTYPE).map(String::as_str), Some("StatefulSet"));
        assert_eq!(sts.get(LABEL_POD_TENANT).map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_autoscaler_label_selector() {
        assert_eq!(
            autoscaler_label_selector(Some("shop"), Some("Deployment")).as_deref(),
            Some("appmgr-autoscaler-app=shop,appmgr-autoscaler-loadType=Deployment")
        );
        assert_eq!(
            autoscaler_label_selector(None, Some("StatefulSet")).as_deref(),
            Some("appmgr-autoscaler-loadType=StatefulSet")
        );
        assert_eq!(
            autoscaler_label_selector(Some("shop"), Some("")).as_deref(),
            Some("appmgr-autoscaler-app=shop")
        );
        assert_eq!(autoscaler_label_selector(None, None), None);
    }
}
