//! String map diff (labels, annotations, selectors).

use std::collections::BTreeMap;

use serde_json::Value as Json;
use tfk8s_core::{escape_pointer, PatchOperations};

/// Diff two string maps under `path`.
///
/// When the old map is empty the whole new map is added at `path`: the live
/// object may not carry the map at all, so per-key adds could target a
/// missing parent. An emptied map removes `path` itself.
pub fn diff_string_map(path: &str, old: &BTreeMap<String, String>, new: &BTreeMap<String, String>) -> PatchOperations {
    let mut ops = PatchOperations::new();
    if old == new {
        return ops;
    }
    if old.is_empty() {
        ops.add(path, to_json(new));
        return ops;
    }
    if new.is_empty() {
        ops.remove(path);
        return ops;
    }
    for k in old.keys().filter(|k| !new.contains_key(*k)) {
        ops.remove(format!("{}/{}", path, escape_pointer(k)));
    }
    for (k, v) in new.iter() {
        let key_path = format!("{}/{}", path, escape_pointer(k));
        match old.get(k) {
            Some(prev) if prev == v => {}
            Some(_) => ops.replace(key_path, Json::String(v.clone())),
            None => ops.add(key_path, Json::String(v.clone())),
        }
    }
    ops
}

fn to_json(m: &BTreeMap<String, String>) -> Json {
    Json::Object(m.iter().map(|(k, v)| (k.clone(), Json::String(v.clone()))).collect())
}
