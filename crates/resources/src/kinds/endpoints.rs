use k8s_openapi::api::core::v1 as core;
use serde_json::Value as Json;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::{patch_metadata, replace_or_add};
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::endpoints::{expand_endpoints_subsets, flatten_endpoints_subsets};
use tfk8s_structure::flatten_metadata;

use crate::schemas::metadata_field;
use crate::{metadata_of, prior_metadata, root, wire, Mapper, MappingError};

pub struct Endpoints;

impl Endpoints {
    fn subsets(config: &Value) -> Result<Option<Json>, MappingError> {
        let f = root(config)?;
        let subsets = expand_endpoints_subsets(f.list("subset")?, &f.path().join("subset"))?;
        if subsets.is_empty() { Ok(None) } else { Ok(Some(wire(&subsets)?)) }
    }
}

fn address_schema() -> Schema {
    Schema::new()
        .field("hostname", Field::string())
        .field("ip", Field::string().required())
        .field("node_name", Field::string())
}

impl Mapper for Endpoints {
    type Object = core::Endpoints;
    const NAME: &'static str = "kubernetes_endpoints";
    const NAMESPACED: bool = true;

    fn schema() -> Schema {
        Schema::new().field("metadata", metadata_field(true)).field(
            "subset",
            Field::blocks(
                Schema::new()
                    .field("address", Field::blocks(address_schema()))
                    .field("not_ready_address", Field::blocks(address_schema()))
                    .field(
                        "port",
                        Field::blocks(
                            Schema::new()
                                .field("name", Field::string())
                                .field("port", Field::int().required())
                                .field("protocol", Field::string()),
                        ),
                    ),
            ),
        )
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        let subsets = expand_endpoints_subsets(f.list("subset")?, &f.path().join("subset"))?;
        Ok(core::Endpoints { metadata: metadata_of(&f)?, subsets: if subsets.is_empty() { None } else { Some(subsets) } })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        m.insert("subset".into(), flatten_endpoints_subsets(object.subsets.as_deref().unwrap_or_default()));
        Ok(Value::Map(m))
    }

    /// Subsets are replaced wholesale.
    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        let mut ops = patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?);
        ops.extend(replace_or_add("/subsets", Self::subsets(old)?.as_ref(), Self::subsets(new)?.as_ref()));
        Ok(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(subsets: serde_json::Value) -> Value {
        Value::from(json!({"metadata": [{"name": "external-db", "namespace": "default"}], "subset": subsets}))
    }

    #[test]
    fn round_trip() {
        let cfg = config(json!([{
            "address": [{"ip": "10.0.0.4"}, {"ip": "10.0.0.5"}],
            "port": [{"name": "pg", "port": 5432, "protocol": "TCP"}]
        }]));
        let obj = Endpoints::expand(&cfg).unwrap();
        assert_eq!(obj.subsets.as_ref().unwrap()[0].ports.as_ref().unwrap()[0].port, 5432);
        assert_eq!(Endpoints::flatten(&obj, &cfg).unwrap(), cfg);
    }

    #[test]
    fn subsets_are_replaced_wholesale() {
        let old = config(json!([{"address": [{"ip": "10.0.0.4"}], "port": [{"port": 80, "protocol": "TCP"}]}]));
        let new = config(json!([{"address": [{"ip": "10.0.0.9"}], "port": [{"port": 80, "protocol": "TCP"}]}]));
        assert_eq!(
            Endpoints::patch(&old, &new).unwrap().to_json(),
            json!([{"op": "replace", "path": "/subsets", "value": [{"addresses": [{"ip": "10.0.0.9"}], "ports": [{"port": 80, "protocol": "TCP"}]}]}])
        );
        let first = Endpoints::patch(&config(json!([])), &new).unwrap();
        assert_eq!(first.iter().map(|o| o.path()).collect::<Vec<_>>(), vec!["/subsets"]);
        assert!(matches!(first.as_slice()[0], tfk8s_core::PatchOperation::Add { .. }));
        assert!(Endpoints::patch(&new, &new).unwrap().is_empty());
    }
}
