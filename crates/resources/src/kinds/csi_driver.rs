use k8s_openapi::api::storage::v1 as storage;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::patch_metadata;
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::csi::{expand_csi_driver_spec, flatten_csi_driver_spec};
use tfk8s_structure::flatten_metadata;

use crate::schemas::metadata_field;
use crate::{metadata_of, prior_metadata, root, Mapper, MappingError};

pub struct CsiDriver;

impl Mapper for CsiDriver {
    type Object = storage::CSIDriver;
    const NAME: &'static str = "kubernetes_csi_driver";
    const NAMESPACED: bool = false;

    fn schema() -> Schema {
        let spec = Schema::new()
            .field("attach_required", Field::bool().required().force_new())
            .field("fs_group_policy", Field::string().computed().force_new())
            .field("pod_info_on_mount", Field::bool().force_new())
            .field("requires_republish", Field::bool().force_new())
            .field("storage_capacity", Field::bool().force_new())
            .field("volume_lifecycle_modes", Field::strings().force_new());
        Schema::new()
            .field("metadata", metadata_field(false))
            .field("spec", Field::block(spec).required().min_items(1))
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        let spec = f.block("spec")?.map(|s| expand_csi_driver_spec(&s)).transpose()?.unwrap_or_default();
        Ok(storage::CSIDriver { metadata: metadata_of(&f)?, spec })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        m.insert("spec".into(), flatten_csi_driver_spec(&object.spec));
        Ok(Value::Map(m))
    }

    /// Driver specs are immutable; only metadata is patched.
    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        Ok(patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?))
    }
}
