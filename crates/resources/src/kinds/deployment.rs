use k8s_openapi::api::apps::v1 as apps;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::{patch_metadata, replace_or_add};
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::deployment::{expand_deployment_spec, flatten_deployment_spec};
use tfk8s_structure::flatten_metadata;

use crate::schemas::{label_selector_schema, metadata_field, metadata_schema, pod_spec_schema};
use crate::{metadata_of, prior_metadata, root, wire, Mapper, MappingError};

pub struct Deployment;

impl Deployment {
    fn spec(config: &Value) -> Result<Option<apps::DeploymentSpec>, MappingError> {
        let f = root(config)?;
        Ok(f.block("spec")?.map(|s| expand_deployment_spec(&s)).transpose()?)
    }
}

impl Mapper for Deployment {
    type Object = apps::Deployment;
    const NAME: &'static str = "kubernetes_deployment";
    const NAMESPACED: bool = true;

    fn schema() -> Schema {
        let strategy = Schema::new().field("type", Field::string()).field(
            "rolling_update",
            Field::block(Schema::new().field("max_surge", Field::string()).field("max_unavailable", Field::string())),
        );
        let template = Schema::new()
            .field("metadata", Field::block(metadata_schema(false)))
            .field("spec", Field::block(pod_spec_schema()).required().min_items(1));
        Schema::new().field("metadata", metadata_field(true)).field(
            "spec",
            Field::block(
                Schema::new()
                    .field("min_ready_seconds", Field::int())
                    .field("paused", Field::bool())
                    .field("progress_deadline_seconds", Field::int())
                    .field("replicas", Field::int())
                    .field("revision_history_limit", Field::int())
                    .field("selector", Field::block(label_selector_schema()).force_new())
                    .field("strategy", Field::block(strategy))
                    .field("template", Field::block(template).required().min_items(1)),
            )
            .required()
            .min_items(1),
        )
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        Ok(apps::Deployment { metadata: metadata_of(&f)?, spec: Self::spec(config)?, ..Default::default() })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        if let Some(spec) = &object.spec {
            let prior_spec = root(prior).ok().and_then(|f| f.block("spec").ok().flatten());
            m.insert("spec".into(), flatten_deployment_spec(spec, prior_spec.as_ref()));
        }
        Ok(Value::Map(m))
    }

    /// The whole spec is replaced when anything in it changed.
    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        let mut ops = patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?);
        let a = Self::spec(old)?.map(|s| wire(&s)).transpose()?;
        let b = Self::spec(new)?.map(|s| wire(&s)).transpose()?;
        ops.extend(replace_or_add("/spec", a.as_ref(), b.as_ref()));
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(replicas: i64, image: &str) -> Value {
        Value::from(json!({
            "metadata": [{"name": "web", "namespace": "default", "labels": {"app": "web"}}],
            "spec": [{
                "replicas": replicas,
                "selector": [{"match_labels": {"app": "web"}}],
                "template": [{
                    "metadata": [{"labels": {"app": "web"}}],
                    "spec": [{"container": [{"name": "web", "image": image}]}]
                }]
            }]
        }))
    }

    #[test]
    fn round_trip() {
        let cfg = config(2, "nginx:1.25");
        let obj = Deployment::expand(&cfg).unwrap();
        let wire = serde_json::to_value(&obj).unwrap();
        assert_eq!(wire["apiVersion"], "apps/v1");
        assert_eq!(wire["spec"]["template"]["spec"]["containers"][0]["image"], "nginx:1.25");
        assert_eq!(Deployment::flatten(&obj, &cfg).unwrap(), cfg);
    }

    #[test]
    fn template_internal_labels_round_trip() {
        let mut cfg = serde_json::Value::from(&config(2, "nginx:1.25"));
        cfg["spec"][0]["template"][0]["metadata"][0]["labels"] = json!({"app.kubernetes.io/name": "web"});
        let cfg = Value::from(cfg);
        let obj = Deployment::expand(&cfg).unwrap();
        assert_eq!(Deployment::flatten(&obj, &cfg).unwrap(), cfg);
    }

    #[test]
    fn spec_change_replaces_spec() {
        let ops = Deployment::patch(&config(2, "nginx:1.25"), &config(3, "nginx:1.25")).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops.as_slice()[0].path(), "/spec");
        assert!(Deployment::patch(&config(2, "nginx:1.25"), &config(2, "nginx:1.25")).unwrap().is_empty());
    }

    #[test]
    fn selector_change_needs_replacement() {
        let old = config(2, "nginx");
        let new = Value::from(json!({
            "metadata": [{"name": "web", "namespace": "default", "labels": {"app": "web"}}],
            "spec": [{
                "replicas": 2,
                "selector": [{"match_labels": {"app": "api"}}],
                "template": [{"metadata": [{"labels": {"app": "web"}}], "spec": [{"container": [{"name": "web", "image": "nginx"}]}]}]
            }]
        }));
        assert_eq!(Deployment::schema().replacement_paths(&old, &new), vec!["spec.0.selector".to_string()]);
    }
}
