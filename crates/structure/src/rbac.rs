//! Role references and subjects of RBAC bindings.

use k8s_openapi::api::rbac::v1::{RoleRef, Subject};
use tfk8s_core::{blocks_of, FieldPath, Fields, Map, Value, ValueError};

pub fn expand_role_ref(f: &Fields<'_>) -> Result<RoleRef, ValueError> {
    Ok(RoleRef {
        api_group: f.str("api_group")?.unwrap_or_default().to_string(),
        kind: f.str("kind")?.unwrap_or_default().to_string(),
        name: f.str("name")?.unwrap_or_default().to_string(),
    })
}

pub fn flatten_role_ref(r: &RoleRef) -> Value {
    let mut m = Map::new();
    m.insert("api_group".into(), Value::from(r.api_group.as_str()));
    m.insert("kind".into(), Value::from(r.kind.as_str()));
    m.insert("name".into(), Value::from(r.name.as_str()));
    Value::block(m)
}

pub fn expand_rbac_subjects(items: &[Value], path: &FieldPath) -> Result<Vec<Subject>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(Subject {
                api_group: f.string("api_group")?,
                kind: f.str("kind")?.unwrap_or_default().to_string(),
                name: f.str("name")?.unwrap_or_default().to_string(),
                namespace: f.string("namespace")?,
            })
        })
        .collect()
}

/// Single subject as a map; all four keys are always present.
pub fn flatten_rbac_subject(s: &Subject) -> Value {
    let mut m = Map::new();
    m.insert("api_group".into(), Value::from(s.api_group.clone().unwrap_or_default()));
    m.insert("kind".into(), Value::from(s.kind.as_str()));
    m.insert("name".into(), Value::from(s.name.as_str()));
    m.insert("namespace".into(), Value::from(s.namespace.clone().unwrap_or_default()));
    Value::Map(m)
}

pub fn flatten_rbac_subjects(subjects: &[Subject]) -> Value {
    Value::List(subjects.iter().map(flatten_rbac_subject).collect())
}
