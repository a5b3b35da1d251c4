//! tfk8s resources: per-kind mapping between declarative configuration and
//! Kubernetes objects, and the registry the session and CLI dispatch through.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::marker::PhantomData;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ApiResource;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as Json;
use tfk8s_core::{FieldPath, Fields, IdError, PatchOperations, ResourceId, Value, ValueError};
use tfk8s_schema::{Schema, ValidationError};
use tfk8s_structure::{build_id, expand_metadata};

pub mod any;
pub mod kinds;
pub mod schemas;

pub use any::RawObject;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("object (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Id(#[from] IdError),
    #[error("{0} is missing")]
    Missing(&'static str),
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(es: &[ValidationError]) -> String {
    es.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Typed mapping for one Kubernetes kind.
pub trait Mapper {
    type Object: kube::Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Configuration type name (`kubernetes_*`).
    const NAME: &'static str;
    const NAMESPACED: bool;

    fn schema() -> Schema;
    fn expand(config: &Value) -> Result<Self::Object, MappingError>;
    /// `prior` is the last known configuration, used to keep user-set internal keys.
    fn flatten(object: &Self::Object, prior: &Value) -> Result<Value, MappingError>;
    fn patch(old: &Value, new: &Value) -> Result<PatchOperations, MappingError>;
    /// Dotted paths of changes the server cannot apply in place.
    fn replacements(old: &Value, new: &Value) -> Vec<String> { Self::schema().replacement_paths(old, new) }
}

/// Object-safe view of a [`Mapper`], working on serialized objects.
pub trait ResourceKind: Send + Sync {
    fn name(&self) -> &'static str;
    fn namespaced(&self) -> bool;
    fn api_resource(&self) -> ApiResource;
    fn schema(&self) -> Schema;
    fn validate(&self, config: &Value) -> Vec<ValidationError> { self.schema().validate(config) }
    /// Force-new fields changed between two configurations.
    fn requires_replacement(&self, old: &Value, new: &Value) -> Vec<String> { self.schema().replacement_paths(old, new) }
    /// Expand into the wire form (with `apiVersion` and `kind`).
    fn expand(&self, config: &Value) -> Result<Json, MappingError>;
    fn flatten(&self, object: &Json, prior: &Value) -> Result<Value, MappingError>;
    fn patch(&self, old: &Value, new: &Value) -> Result<PatchOperations, MappingError>;
    fn id_of(&self, object: &Json) -> Result<ResourceId, MappingError>;
}

pub struct Kind<M>(PhantomData<fn() -> M>);

impl<M> Default for Kind<M> {
    fn default() -> Self { Kind(PhantomData) }
}

impl<M: Mapper> ResourceKind for Kind<M> {
    fn name(&self) -> &'static str { M::NAME }
    fn namespaced(&self) -> bool { M::NAMESPACED }
    fn api_resource(&self) -> ApiResource { ApiResource::erase::<M::Object>(&()) }
    fn schema(&self) -> Schema { M::schema() }
    fn requires_replacement(&self, old: &Value, new: &Value) -> Vec<String> { M::replacements(old, new) }

    fn expand(&self, config: &Value) -> Result<Json, MappingError> {
        Ok(serde_json::to_value(M::expand(config)?)?)
    }

    fn flatten(&self, object: &Json, prior: &Value) -> Result<Value, MappingError> {
        let obj: M::Object = serde_json::from_value(object.clone())?;
        M::flatten(&obj, prior)
    }

    fn patch(&self, old: &Value, new: &Value) -> Result<PatchOperations, MappingError> { M::patch(old, new) }

    fn id_of(&self, object: &Json) -> Result<ResourceId, MappingError> {
        let meta = object.get("metadata").ok_or(MappingError::Missing("metadata"))?;
        let meta: ObjectMeta = serde_json::from_value(meta.clone())?;
        if meta.name.as_deref().unwrap_or_default().is_empty() {
            return Err(MappingError::Missing("metadata.name"));
        }
        let id = build_id(&meta);
        Ok(if M::NAMESPACED { id } else { ResourceId::cluster(id.name) })
    }
}

/// Resource kinds by configuration type name.
#[derive(Default)]
pub struct Registry {
    kinds: BTreeMap<&'static str, Box<dyn ResourceKind>>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Registry with every built-in kind.
    pub fn builtin() -> Self {
        let mut r = Self::new();
        r.register::<kinds::RoleBinding>();
        r.register::<kinds::Endpoints>();
        r.register::<kinds::NetworkPolicy>();
        r.register::<kinds::Deployment>();
        r.register::<kinds::PersistentVolumeClaim>();
        r.register::<kinds::Pod>();
        r.register::<kinds::CsiDriver>();
        r
    }

    pub fn register<M: Mapper + 'static>(&mut self) {
        self.kinds.insert(M::NAME, Box::new(Kind::<M>::default()));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ResourceKind> { self.kinds.get(name).map(|k| k.as_ref()) }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ { self.kinds.keys().copied() }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ResourceKind> + '_ { self.kinds.values().map(|k| k.as_ref()) }
}

/// Top-level configuration map (null reads as empty).
pub(crate) fn root(config: &Value) -> Result<Fields<'_>, MappingError> {
    Ok(Fields::of(config, FieldPath::root())?)
}

pub(crate) fn metadata_of(f: &Fields<'_>) -> Result<ObjectMeta, MappingError> {
    Ok(f.block("metadata")?.map(|m| expand_metadata(&m)).transpose()?.unwrap_or_default())
}

/// The prior configuration's `metadata` block, if it has one.
pub(crate) fn prior_metadata(prior: &Value) -> Option<Fields<'_>> {
    root(prior).ok().and_then(|f| f.block("metadata").ok().flatten())
}

/// Serialize a fragment of an API object for patch building.
pub(crate) fn wire<T: Serialize>(v: &T) -> Result<Json, MappingError> {
    Ok(serde_json::to_value(v)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_registry_names() {
        let r = Registry::builtin();
        let names: Vec<_> = r.names().collect();
        assert_eq!(
            names,
            vec![
                "kubernetes_csi_driver",
                "kubernetes_deployment",
                "kubernetes_endpoints",
                "kubernetes_network_policy",
                "kubernetes_persistent_volume_claim",
                "kubernetes_pod",
                "kubernetes_role_binding",
            ]
        );
        assert!(r.get("kubernetes_secret").is_none());
    }

    #[test]
    fn api_resources_match_kinds() {
        let r = Registry::builtin();
        let rb = r.get("kubernetes_role_binding").unwrap().api_resource();
        assert_eq!((rb.group.as_str(), rb.version.as_str(), rb.plural.as_str()), ("rbac.authorization.k8s.io", "v1", "rolebindings"));
        let csi = r.get("kubernetes_csi_driver").unwrap();
        assert!(!csi.namespaced());
        assert_eq!(csi.api_resource().kind, "CSIDriver");
    }

    #[test]
    fn ids_from_wire_objects() {
        let r = Registry::builtin();
        let pod = r.get("kubernetes_pod").unwrap();
        let id = pod.id_of(&json!({"metadata": {"name": "web", "namespace": "apps"}})).unwrap();
        assert_eq!(id.to_string(), "apps/web");
        let csi = r.get("kubernetes_csi_driver").unwrap();
        assert_eq!(csi.id_of(&json!({"metadata": {"name": "ebs.csi.aws.com"}})).unwrap().to_string(), "ebs.csi.aws.com");
        assert!(matches!(pod.id_of(&json!({"metadata": {}})), Err(MappingError::Missing("metadata.name"))));
    }
}
