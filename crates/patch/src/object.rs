//! Whole-value diffs over serialized API fragments, and metadata patches.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value as Json;
use tfk8s_core::{escape_pointer, PatchOperations};

use crate::list::diff_list;
use crate::map::diff_string_map;

/// Recursive diff of two JSON values at `path`.
///
/// Objects recurse per key, arrays use [`diff_list`], anything else is replaced.
/// A null side counts as absent: null → value is an `add`, value → null a `remove`.
pub fn diff_value(path: &str, old: &Json, new: &Json) -> PatchOperations {
    let mut ops = PatchOperations::new();
    if old == new {
        return ops;
    }
    match (old, new) {
        (Json::Null, v) => ops.add(path, v.clone()),
        (_, Json::Null) => ops.remove(path),
        (Json::Object(a), Json::Object(b)) => {
            // sorted keys keep the output stable whatever the map ordering
            let mut gone: Vec<&String> = a.keys().filter(|k| !b.contains_key(*k)).collect();
            gone.sort();
            for k in gone {
                ops.remove(format!("{}/{}", path, escape_pointer(k)));
            }
            let mut keys: Vec<&String> = b.keys().collect();
            keys.sort();
            for k in keys {
                let key_path = format!("{}/{}", path, escape_pointer(k));
                match (a.get(k), &b[k]) {
                    (Some(av), bv) => ops.extend(diff_value(&key_path, av, bv)),
                    (None, bv) => ops.add(key_path, bv.clone()),
                }
            }
        }
        (Json::Array(a), Json::Array(b)) => ops.extend(diff_list(path, a, b)),
        (_, v) => ops.replace(path, v.clone()),
    }
    ops
}

/// Whole-field update: `add` when the field was absent, `replace` when it
/// changed, `remove` when it was cleared.
pub fn replace_or_add(path: &str, old: Option<&Json>, new: Option<&Json>) -> PatchOperations {
    let mut ops = PatchOperations::new();
    let old = old.filter(|v| !v.is_null());
    let new = new.filter(|v| !v.is_null());
    match (old, new) {
        (None, Some(v)) => ops.add(path, v.clone()),
        (Some(a), Some(b)) if a != b => ops.replace(path, b.clone()),
        (Some(_), None) => ops.remove(path),
        _ => {}
    }
    ops
}

/// Label and annotation changes under `prefix` (e.g. `/metadata` or `/spec/template/metadata`).
pub fn patch_metadata(prefix: &str, old: &ObjectMeta, new: &ObjectMeta) -> PatchOperations {
    let empty = BTreeMap::new();
    let mut ops = PatchOperations::new();
    ops.extend(diff_string_map(
        &format!("{}/annotations", prefix),
        old.annotations.as_ref().unwrap_or(&empty),
        new.annotations.as_ref().unwrap_or(&empty),
    ));
    ops.extend(diff_string_map(
        &format!("{}/labels", prefix),
        old.labels.as_ref().unwrap_or(&empty),
        new.labels.as_ref().unwrap_or(&empty),
    ));
    ops
}
