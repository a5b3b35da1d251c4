use k8s_openapi::api::core::v1 as core;
use serde_json::Value as Json;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::{patch_metadata, replace_or_add};
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::flatten_metadata;
use tfk8s_structure::pod::{expand_pod_spec, flatten_pod_spec};

use crate::schemas::{container_schema, metadata_field, pod_spec_schema};
use crate::{metadata_of, prior_metadata, root, Mapper, MappingError};

pub struct Pod;

impl Pod {
    /// Running pods accept only container image and active deadline changes.
    fn spec_schema() -> Schema {
        pod_spec_schema().immutable_except(&["active_deadline_seconds", "container"]).field(
            "container",
            Field::blocks(container_schema().immutable_except(&["image"])).required().min_items(1),
        )
    }

    fn spec(config: &Value) -> Result<core::PodSpec, MappingError> {
        let f = root(config)?;
        Ok(f.block("spec")?.map(|s| expand_pod_spec(&s)).transpose()?.unwrap_or_default())
    }
}

impl Mapper for Pod {
    type Object = core::Pod;
    const NAME: &'static str = "kubernetes_pod";
    const NAMESPACED: bool = true;

    fn schema() -> Schema {
        Schema::new()
            .field("metadata", metadata_field(true))
            .field("spec", Field::block(Self::spec_schema()).required().min_items(1))
            .field("status", Field::string().computed())
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        Ok(core::Pod { metadata: metadata_of(&f)?, spec: Some(Self::spec(config)?), ..Default::default() })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        if let Some(spec) = &object.spec {
            m.insert("spec".into(), flatten_pod_spec(spec));
        }
        if let Some(phase) = object.status.as_ref().and_then(|s| s.phase.clone()) {
            m.insert("status".into(), Value::String(phase));
        }
        Ok(Value::Map(m))
    }

    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        let mut ops = patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?);
        let (a, b) = (Self::spec(old)?, Self::spec(new)?);
        for (i, (ca, cb)) in a.containers.iter().zip(b.containers.iter()).enumerate() {
            if ca.image != cb.image {
                if let Some(image) = &cb.image {
                    ops.replace(format!("/spec/containers/{}/image", i), Json::String(image.clone()));
                }
            }
        }
        let deadline = |s: &core::PodSpec| s.active_deadline_seconds.map(Json::from);
        ops.extend(replace_or_add("/spec/activeDeadlineSeconds", deadline(&a).as_ref(), deadline(&b).as_ref()));
        Ok(ops)
    }

    fn replacements(old: &Value, new: &Value) -> Vec<String> {
        let mut paths = Self::schema().replacement_paths(old, new);
        let count = |v: &Value| v.pointer("spec.0.container").and_then(Value::as_list).map_or(0, <[Value]>::len);
        if count(old) != count(new) {
            paths.push("spec.0.container".into());
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(image: &str, deadline: Option<i64>) -> Value {
        let mut spec = json!({"container": [{"name": "app", "image": image}, {"name": "sidecar", "image": "envoy:1.29"}]});
        if let Some(d) = deadline {
            spec["active_deadline_seconds"] = json!(d);
        }
        Value::from(json!({"metadata": [{"name": "web", "namespace": "default"}], "spec": [spec]}))
    }

    #[test]
    fn status_phase_is_reported() {
        let cfg = config("nginx:1.25", None);
        let mut obj = Pod::expand(&cfg).unwrap();
        obj.status = Some(core::PodStatus { phase: Some("Running".into()), ..Default::default() });
        let flat = Pod::flatten(&obj, &cfg).unwrap();
        assert_eq!(flat.pointer("status").and_then(Value::as_str), Some("Running"));
        assert_eq!(flat.pointer("spec"), cfg.pointer("spec"));
    }

    #[test]
    fn image_and_deadline_patch() {
        let ops = Pod::patch(&config("nginx:1.25", None), &config("nginx:1.26", Some(600))).unwrap();
        assert_eq!(
            ops.to_json(),
            json!([
                {"op": "replace", "path": "/spec/containers/0/image", "value": "nginx:1.26"},
                {"op": "add", "path": "/spec/activeDeadlineSeconds", "value": 600}
            ])
        );
        assert!(Pod::patch(&config("nginx:1.25", Some(600)), &config("nginx:1.25", Some(600))).unwrap().is_empty());
        assert!(Pod::replacements(&config("nginx:1.25", None), &config("nginx:1.26", Some(600))).is_empty());
    }

    fn with_env(value: &str) -> Value {
        Value::from(json!({
            "metadata": [{"name": "web", "namespace": "default"}],
            "spec": [{"container": [{"name": "app", "image": "nginx:1.25", "env": [{"name": "STAGE", "value": value}]}]}]
        }))
    }

    #[test]
    fn container_env_change_forces_replacement() {
        let (old, new) = (with_env("dev"), with_env("prod"));
        assert_eq!(Pod::replacements(&old, &new), vec!["spec.0.container.0.env".to_string()]);
        assert!(Pod::patch(&old, &new).unwrap().is_empty());
    }

    #[test]
    fn container_count_change_forces_replacement() {
        let old = with_env("dev");
        let mut new = serde_json::Value::from(&old);
        new["spec"][0]["container"].as_array_mut().unwrap().push(json!({"name": "sidecar", "image": "envoy:1.29"}));
        assert_eq!(Pod::replacements(&old, &Value::from(new)), vec!["spec.0.container".to_string()]);
    }

    #[test]
    fn pod_spec_fields_force_replacement() {
        let old = config("nginx:1.25", None);
        let mut new = serde_json::Value::from(&old);
        new["spec"][0]["restart_policy"] = json!("Never");
        new["spec"][0]["node_selector"] = json!({"disk": "ssd"});
        assert_eq!(
            Pod::replacements(&old, &Value::from(new)),
            vec!["spec.0.node_selector".to_string(), "spec.0.restart_policy".to_string()]
        );
    }
}
