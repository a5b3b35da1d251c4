//! Persistent volume claim spec.

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, VolumeResourceRequirements};
use tfk8s_core::{Fields, Map, Value, ValueError};

use crate::selector::{expand_label_selector, flatten_label_selector};
use crate::util::{block_with, non_empty, put, put_str, quantities, quantities_value, strings};

pub fn expand_persistent_volume_claim_spec(f: &Fields<'_>) -> Result<PersistentVolumeClaimSpec, ValueError> {
    Ok(PersistentVolumeClaimSpec {
        access_modes: non_empty(f.string_list("access_modes")?),
        resources: block_with(f, "resources", |r| {
            Ok(VolumeResourceRequirements {
                limits: quantities(r.string_map("limits")?),
                requests: quantities(r.string_map("requests")?),
                ..Default::default()
            })
        })?,
        selector: block_with(f, "selector", expand_label_selector)?,
        storage_class_name: f.string("storage_class_name")?,
        volume_mode: f.string("volume_mode")?,
        volume_name: f.string("volume_name")?,
        ..Default::default()
    })
}

pub fn flatten_persistent_volume_claim_spec(spec: &PersistentVolumeClaimSpec) -> Value {
    let mut m = Map::new();
    if let Some(a) = spec.access_modes.as_ref().filter(|a| !a.is_empty()) {
        m.insert("access_modes".into(), strings(a));
    }
    if let Some(r) = &spec.resources {
        let mut rm = Map::new();
        put(&mut rm, "limits", r.limits.as_ref().filter(|l| !l.is_empty()).map(quantities_value));
        put(&mut rm, "requests", r.requests.as_ref().filter(|q| !q.is_empty()).map(quantities_value));
        m.insert("resources".into(), Value::block(rm));
    }
    put(&mut m, "selector", spec.selector.as_ref().map(flatten_label_selector));
    put_str(&mut m, "storage_class_name", spec.storage_class_name.as_ref());
    put_str(&mut m, "volume_mode", spec.volume_mode.as_ref());
    put_str(&mut m, "volume_name", spec.volume_name.as_ref());
    Value::block(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claim_spec_round_trip() {
        let cfg = Value::from(json!({
            "access_modes": ["ReadWriteOnce"],
            "resources": [{"requests": {"storage": "5Gi"}}],
            "selector": [{"match_labels": {"tier": "fast"}}],
            "storage_class_name": "standard"
        }));
        let spec = expand_persistent_volume_claim_spec(&Fields::root(cfg.as_map().unwrap())).unwrap();
        let storage = spec.resources.as_ref().and_then(|r| r.requests.as_ref()).and_then(|q| q.get("storage")).map(|q| q.0.clone());
        assert_eq!(storage.as_deref(), Some("5Gi"));
        assert!(spec.volume_name.is_none());
        assert_eq!(flatten_persistent_volume_claim_spec(&spec), Value::List(vec![cfg]));
    }

    #[test]
    fn bound_volume_name_is_reported() {
        let spec = PersistentVolumeClaimSpec { volume_name: Some("pvc-0a1b".into()), ..Default::default() };
        assert_eq!(flatten_persistent_volume_claim_spec(&spec), Value::from(json!([{"volume_name": "pvc-0a1b"}])));
    }
}
