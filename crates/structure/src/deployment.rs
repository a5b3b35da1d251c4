//! Deployment spec, rollout strategy and pod templates.

use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use tfk8s_core::{Fields, Map, Value, ValueError};

use crate::metadata::{expand_metadata, flatten_metadata};
use crate::pod::{expand_pod_spec, flatten_pod_spec};
use crate::selector::{expand_label_selector, flatten_label_selector};
use crate::util::{block_with, int_or_string, int_or_string_value, put, put_str};

pub fn expand_deployment_spec(f: &Fields<'_>) -> Result<DeploymentSpec, ValueError> {
    Ok(DeploymentSpec {
        min_ready_seconds: f.i32("min_ready_seconds")?,
        paused: f.bool("paused")?,
        progress_deadline_seconds: f.i32("progress_deadline_seconds")?,
        replicas: f.i32("replicas")?,
        revision_history_limit: f.i32("revision_history_limit")?,
        selector: block_with(f, "selector", expand_label_selector)?.unwrap_or_default(),
        strategy: block_with(f, "strategy", expand_strategy)?,
        template: block_with(f, "template", expand_pod_template)?.unwrap_or_default(),
    })
}

/// `prior` is the configured spec block; its template metadata keeps user-set internal keys.
pub fn flatten_deployment_spec(spec: &DeploymentSpec, prior: Option<&Fields<'_>>) -> Value {
    let prior_template = prior.and_then(|p| p.block("template").ok().flatten());
    let mut m = Map::new();
    put(&mut m, "min_ready_seconds", spec.min_ready_seconds);
    put(&mut m, "paused", spec.paused);
    put(&mut m, "progress_deadline_seconds", spec.progress_deadline_seconds);
    put(&mut m, "replicas", spec.replicas);
    put(&mut m, "revision_history_limit", spec.revision_history_limit);
    m.insert("selector".into(), flatten_label_selector(&spec.selector));
    put(&mut m, "strategy", spec.strategy.as_ref().map(flatten_strategy));
    m.insert("template".into(), flatten_pod_template(&spec.template, prior_template.as_ref()));
    Value::block(m)
}

fn expand_strategy(f: &Fields<'_>) -> Result<DeploymentStrategy, ValueError> {
    Ok(DeploymentStrategy {
        type_: f.string("type")?,
        rolling_update: block_with(f, "rolling_update", |r| {
            Ok(RollingUpdateDeployment {
                max_surge: r.string("max_surge")?.as_deref().map(int_or_string),
                max_unavailable: r.string("max_unavailable")?.as_deref().map(int_or_string),
            })
        })?,
    })
}

fn flatten_strategy(s: &DeploymentStrategy) -> Value {
    let mut m = Map::new();
    put_str(&mut m, "type", s.type_.as_ref());
    if let Some(r) = &s.rolling_update {
        let mut rm = Map::new();
        put(&mut rm, "max_surge", r.max_surge.as_ref().map(int_or_string_value));
        put(&mut rm, "max_unavailable", r.max_unavailable.as_ref().map(int_or_string_value));
        m.insert("rolling_update".into(), Value::block(rm));
    }
    Value::block(m)
}

pub fn expand_pod_template(f: &Fields<'_>) -> Result<PodTemplateSpec, ValueError> {
    Ok(PodTemplateSpec {
        metadata: block_with(f, "metadata", expand_metadata)?,
        spec: block_with(f, "spec", expand_pod_spec)?,
    })
}

pub fn flatten_pod_template(t: &PodTemplateSpec, prior: Option<&Fields<'_>>) -> Value {
    let prior_meta = prior.and_then(|p| p.block("metadata").ok().flatten());
    let mut m = Map::new();
    put(&mut m, "metadata", t.metadata.as_ref().map(|meta| flatten_metadata(meta, prior_meta.as_ref())));
    put(&mut m, "spec", t.spec.as_ref().map(flatten_pod_spec));
    Value::block(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use serde_json::json;

    #[test]
    fn deployment_spec_round_trip() {
        let cfg = Value::from(json!({
            "replicas": 3,
            "revision_history_limit": 5,
            "selector": [{"match_labels": {"app": "web"}}],
            "strategy": [{"type": "RollingUpdate", "rolling_update": [{"max_surge": "25%", "max_unavailable": "1"}]}],
            "template": [{
                "metadata": [{"labels": {"app": "web"}}],
                "spec": [{"container": [{"name": "web", "image": "nginx:1.25"}]}]
            }]
        }));
        let spec = expand_deployment_spec(&Fields::root(cfg.as_map().unwrap())).unwrap();
        assert_eq!(spec.replicas, Some(3));
        let ru = spec.strategy.as_ref().and_then(|s| s.rolling_update.as_ref()).unwrap();
        assert_eq!(ru.max_surge, Some(IntOrString::String("25%".into())));
        assert_eq!(ru.max_unavailable, Some(IntOrString::Int(1)));
        assert_eq!(spec.template.spec.as_ref().map(|s| s.containers.len()), Some(1));
        assert_eq!(flatten_deployment_spec(&spec, None), Value::List(vec![cfg]));
    }

    #[test]
    fn configured_internal_template_labels_survive() {
        let cfg = Value::from(json!({
            "selector": [{"match_labels": {"app.kubernetes.io/name": "web"}}],
            "template": [{
                "metadata": [{"labels": {"app.kubernetes.io/name": "web"}}],
                "spec": [{"container": [{"name": "web", "image": "nginx:1.25"}]}]
            }]
        }));
        let f = Fields::root(cfg.as_map().unwrap());
        let spec = expand_deployment_spec(&f).unwrap();
        assert_eq!(flatten_deployment_spec(&spec, Some(&f)), Value::List(vec![cfg.clone()]));
        // without a prior configuration the internal label is treated as server-owned
        assert_eq!(flatten_deployment_spec(&spec, None).pointer("0.template.0.metadata"), Some(&Value::block(Map::new())));
    }

    #[test]
    fn replicas_out_of_range() {
        let cfg = Value::from(json!({"replicas": 1i64 << 33}));
        let err = expand_deployment_spec(&Fields::root(cfg.as_map().unwrap())).unwrap_err();
        assert!(matches!(err, ValueError::OutOfRange { ref path, .. } if path == "replicas"), "{err}");
    }
}
