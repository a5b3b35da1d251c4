use k8s_openapi::api::rbac::v1 as rbac;
use tfk8s_core::{Map, PatchOperations, Value};
use tfk8s_patch::{diff_list, patch_metadata};
use tfk8s_schema::{Field, Schema};
use tfk8s_structure::flatten_metadata;
use tfk8s_structure::rbac::{expand_rbac_subjects, expand_role_ref, flatten_rbac_subjects, flatten_role_ref};

use crate::schemas::metadata_field;
use crate::{metadata_of, prior_metadata, root, wire, Mapper, MappingError};

pub struct RoleBinding;

impl RoleBinding {
    fn subjects(config: &Value) -> Result<Vec<rbac::Subject>, MappingError> {
        let f = root(config)?;
        Ok(expand_rbac_subjects(f.list("subject")?, &f.path().join("subject"))?)
    }
}

impl Mapper for RoleBinding {
    type Object = rbac::RoleBinding;
    const NAME: &'static str = "kubernetes_role_binding";
    const NAMESPACED: bool = true;

    fn schema() -> Schema {
        Schema::new()
            .field("metadata", metadata_field(true))
            .field(
                "role_ref",
                Field::block(
                    Schema::new()
                        .field("api_group", Field::string().required())
                        .field("kind", Field::string().required())
                        .field("name", Field::string().required()),
                )
                .required()
                .min_items(1)
                .force_new(),
            )
            .field(
                "subject",
                Field::blocks(
                    Schema::new()
                        .field("kind", Field::string().required())
                        .field("name", Field::string().required())
                        .field("api_group", Field::string())
                        .field("namespace", Field::string()),
                )
                .required()
                .min_items(1),
            )
    }

    fn expand(config: &Value) -> Result<Self::Object, MappingError> {
        let f = root(config)?;
        let role_ref = f.block("role_ref")?.ok_or(MappingError::Missing("role_ref"))?;
        let subjects = Self::subjects(config)?;
        Ok(rbac::RoleBinding {
            metadata: metadata_of(&f)?,
            role_ref: expand_role_ref(&role_ref)?,
            subjects: if subjects.is_empty() { None } else { Some(subjects) },
        })
    }

    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError> {
        let mut m = Map::new();
        m.insert("metadata".into(), flatten_metadata(&object.metadata, prior_metadata(prior).as_ref()));
        m.insert("role_ref".into(), flatten_role_ref(&object.role_ref));
        m.insert("subject".into(), flatten_rbac_subjects(object.subjects.as_deref().unwrap_or_default()));
        Ok(Value::Map(m))
    }

    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError> {
        let mut ops = patch_metadata("/metadata", &metadata_of(&root(old)?)?, &metadata_of(&root(new)?)?);
        let (a, b) = (wire(&Self::subjects(old)?)?, wire(&Self::subjects(new)?)?);
        if let (Some(a), Some(b)) = (a.as_array(), b.as_array()) {
            ops.extend(diff_list("/subjects", a, b));
        }
        Ok(ops)
    }
}
