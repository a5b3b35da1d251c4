//! Raw objects (`kubernetes_any`): an arbitrary Kubernetes document given as JSON.

use kube::core::GroupVersionKind;
use serde_json::Value as Json;
use tfk8s_core::ResourceId;
use tfk8s_schema::{Field, Schema};

use crate::MappingError;

pub const NAME: &str = "kubernetes_any";

pub fn schema() -> Schema {
    Schema::new().field("object_json", Field::string().required())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    /// The document as submitted, with `metadata.namespace` filled in.
    pub object: Json,
}

impl RawObject {
    pub fn parse(object_json: &str, default_namespace: &str) -> Result<Self, MappingError> {
        Self::from_json(serde_json::from_str(object_json)?, default_namespace)
    }

    pub fn from_json(mut object: Json, default_namespace: &str) -> Result<Self, MappingError> {
        let str_at = |v: &Json, ptr: &str| v.pointer(ptr).and_then(Json::as_str).map(str::to_string);
        let api_version = str_at(&object, "/apiVersion").ok_or(MappingError::Missing("apiVersion"))?;
        let kind = str_at(&object, "/kind").ok_or(MappingError::Missing("kind"))?;
        let name = str_at(&object, "/metadata/name").filter(|n| !n.is_empty()).ok_or(MappingError::Missing("metadata.name"))?;
        let namespace = str_at(&object, "/metadata/namespace")
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| default_namespace.to_string());
        if let Some(meta) = object.get_mut("metadata").and_then(Json::as_object_mut) {
            meta.insert("namespace".into(), Json::String(namespace.clone()));
        }
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version),
        };
        Ok(Self { group, version, kind, name, namespace, object })
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind { group: self.group.clone(), version: self.version.clone(), kind: self.kind.clone() }
    }

    pub fn id(&self) -> ResourceId { ResourceId::namespaced(&self.namespace, &self.name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grouped_and_core_versions() {
        let d = RawObject::parse(r#"{"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "web", "namespace": "apps"}}"#, "default")
            .unwrap();
        assert_eq!((d.group.as_str(), d.version.as_str(), d.kind.as_str()), ("apps", "v1", "Deployment"));
        assert_eq!(d.id().to_string(), "apps/web");
        assert_eq!(d.api_version(), "apps/v1");

        let cm = RawObject::parse(r#"{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg"}}"#, "default").unwrap();
        assert_eq!(cm.group, "");
        assert_eq!(cm.version, "v1");
        assert_eq!(cm.id().to_string(), "default/cfg");
        assert_eq!(cm.object["metadata"]["namespace"], "default");
    }

    #[test]
    fn missing_fields_are_named() {
        let cases = [
            (r#"{"kind": "ConfigMap", "metadata": {"name": "x"}}"#, "apiVersion"),
            (r#"{"apiVersion": "v1", "metadata": {"name": "x"}}"#, "kind"),
            (r#"{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {}}"#, "metadata.name"),
        ];
        for (doc, field) in cases {
            match RawObject::parse(doc, "default") {
                Err(MappingError::Missing(f)) => assert_eq!(f, field),
                other => panic!("expected missing {field}, got {other:?}"),
            }
        }
        assert!(matches!(RawObject::parse("{not json", "default"), Err(MappingError::Json(_))));
    }
}
