//! Object metadata (`metadata` block) and identifiers.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tfk8s_core::{Fields, Map, ResourceId, Value, ValueError};

use crate::util::{non_empty_map, put, put_str, string_map};

pub fn expand_metadata(f: &Fields<'_>) -> Result<ObjectMeta, ValueError> {
    Ok(ObjectMeta {
        annotations: non_empty_map(f.string_map("annotations")?),
        labels: non_empty_map(f.string_map("labels")?),
        generate_name: f.string("generate_name")?,
        name: f.string("name")?,
        namespace: f.string("namespace")?,
        ..Default::default()
    })
}

/// Flatten server metadata into a single `metadata` block.
///
/// Labels and annotations owned by Kubernetes itself (keys under a `*kubernetes.io`
/// domain) are dropped unless `prior` configuration set them explicitly, so they
/// never show up as drift.
pub fn flatten_metadata(meta: &ObjectMeta, prior: Option<&Fields<'_>>) -> Value {
    let mut m = Map::new();
    let configured = |key: &str| prior.and_then(|p| p.string_map(key).ok()).unwrap_or_default();
    if let Some(a) = &meta.annotations {
        let a = remove_internal_keys(a, &configured("annotations"));
        if !a.is_empty() { m.insert("annotations".into(), string_map(&a)); }
    }
    if let Some(l) = &meta.labels {
        let l = remove_internal_keys(l, &configured("labels"));
        if !l.is_empty() { m.insert("labels".into(), string_map(&l)); }
    }
    put_str(&mut m, "generate_name", meta.generate_name.as_ref());
    put_str(&mut m, "name", meta.name.as_ref());
    put_str(&mut m, "namespace", meta.namespace.as_ref());
    put(&mut m, "generation", meta.generation);
    put_str(&mut m, "resource_version", meta.resource_version.as_ref());
    put_str(&mut m, "uid", meta.uid.as_ref());
    Value::block(m)
}

/// Whether a label/annotation key belongs to Kubernetes (`kubernetes.io`, `*.kubernetes.io`).
pub fn is_internal_key(key: &str) -> bool {
    let host = key.split_once('/').map(|(d, _)| d).unwrap_or(key);
    host.ends_with("kubernetes.io")
}

fn remove_internal_keys(m: &BTreeMap<String, String>, configured: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    m.iter()
        .filter(|(k, _)| !is_internal_key(k) || configured.contains_key(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build the external identifier from server metadata.
pub fn build_id(meta: &ObjectMeta) -> ResourceId {
    let name = meta.name.clone().unwrap_or_default();
    match meta.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        Some(ns) => ResourceId::namespaced(ns, name),
        None => ResourceId::cluster(name),
    }
}
