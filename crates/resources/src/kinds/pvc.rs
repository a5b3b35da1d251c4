use k8s_openapi::api::core::v1 as core;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::patch_metadata;
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::flatten_metadata;
use tfk8s_structure::pvc::{expand_persistent_volume_claim_spec, flatten_persistent_volume_claim_spec};

use crate::schemas::{label_selector_schema, metadata_field};
use crate::{metadata_of, prior_metadata, root, Mapper, MappingError};

pub struct PersistentVolumeClaim;

impl Mapper for PersistentVolumeClaim {
    type Object = core::PersistentVolumeClaim;
    const NAME: &'static str = "kubernetes_persistent_volume_claim";
    const NAMESPACED: bool = true;

    fn schema() -> Schema {
        let spec = Schema::new()
            .field("access_modes", Field::strings().required().min_items(1).force_new())
            .field(
                "resources",
                Field::block(Schema::new().field("limits", Field::map()).field("requests", Field::map()))
                    .required()
                    .min_items(1)
                    .force_new(),
            )
            .field("selector", Field::block(label_selector_schema()).force_new())
            .field("storage_class_name", Field::string().computed().force_new())
            .field("volume_mode", Field::string().computed().force_new())
            .field("volume_name", Field::string().computed().force_new());
        Schema::new()
            .field("metadata", metadata_field(true))
            .field("spec", Field::block(spec).required().min_items(1))
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        Ok(core::PersistentVolumeClaim {
            metadata: metadata_of(&f)?,
            spec: f.block("spec")?.map(|s| expand_persistent_volume_claim_spec(&s)).transpose()?,
            ..Default::default()
        })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        if let Some(spec) = &object.spec {
            m.insert("spec".into(), flatten_persistent_volume_claim_spec(spec));
        }
        Ok(Value::Map(m))
    }

    /// Claim specs are immutable; only metadata is patched.
    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        Ok(patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?))
    }
}
