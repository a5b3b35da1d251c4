use k8s_openapi::api::networking::v1 as networking;
use serde_json::Value as Json;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::{patch_metadata, replace_or_add};
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::flatten_metadata;
use tfk8s_structure::network_policy::{expand_network_policy_spec, flatten_network_policy_spec};

use crate::schemas::{label_selector_schema, metadata_field};
use crate::{metadata_of, prior_metadata, root, wire, Mapper, MappingError};

pub struct NetworkPolicy;

/// Spec fields patched individually, by wire name.
const SPEC_FIELDS: [&str; 4] = ["podSelector", "ingress", "egress", "policyTypes"];

impl NetworkPolicy {
    fn spec(config: &Value) -> Result<networking::NetworkPolicySpec, MappingError> {
        let f = root(config)?;
        Ok(f.block("spec")?.map(|s| expand_network_policy_spec(&s)).transpose()?.unwrap_or_default())
    }
}

fn port_schema() -> Schema {
    Schema::new()
        .field("port", Field::string())
        .field("end_port", Field::int())
        .field("protocol", Field::string())
}

fn peer_schema() -> Schema {
    Schema::new()
        .field(
            "ip_block",
            Field::block(Schema::new().field("cidr", Field::string().required()).field("except", Field::strings())),
        )
        .field("namespace_selector", Field::block(label_selector_schema()))
        .field("pod_selector", Field::block(label_selector_schema()))
}

impl Mapper for NetworkPolicy {
    type Object = networking::NetworkPolicy;
    const NAME: &'static str = "kubernetes_network_policy";
    const NAMESPACED: bool = true;

    fn schema() -> Schema {
        Schema::new().field("metadata", metadata_field(true)).field(
            "spec",
            Field::block(
                Schema::new()
                    .field("pod_selector", Field::block(label_selector_schema()).required().min_items(1))
                    .field(
                        "ingress",
                        Field::blocks(Schema::new().field("ports", Field::blocks(port_schema())).field("from", Field::blocks(peer_schema()))),
                    )
                    .field(
                        "egress",
                        Field::blocks(Schema::new().field("ports", Field::blocks(port_schema())).field("to", Field::blocks(peer_schema()))),
                    )
                    .field("policy_types", Field::strings()),
            )
            .required()
            .min_items(1),
        )
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        Ok(networking::NetworkPolicy { metadata: metadata_of(&f)?, spec: Some(Self::spec(config)?), ..Default::default() })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        m.insert("spec".into(), flatten_network_policy_spec(&object.spec.clone().unwrap_or_default()));
        Ok(Value::Map(m))
    }

    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        let mut ops = patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?);
        let (a, b) = (wire(&Self::spec(old)?)?, wire(&Self::spec(new)?)?);
        let field = |spec: &Json, key: &str| spec.get(key).cloned();
        for key in SPEC_FIELDS {
            ops.extend(replace_or_add(&format!("/spec/{}", key), field(&a, key).as_ref(), field(&b, key).as_ref()));
        }
        Ok(ops)
    }
}
