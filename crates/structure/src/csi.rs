//! CSI driver spec.

use k8s_openapi::api::storage::v1::CSIDriverSpec;
use tfk8s_core::{Fields, Map, Value, ValueError};

use crate::util::{non_empty, put, put_str, strings};

pub fn expand_csi_driver_spec(f: &Fields<'_>) -> Result<CSIDriverSpec, ValueError> {
    Ok(CSIDriverSpec {
        attach_required: f.bool("attach_required")?,
        fs_group_policy: f.string("fs_group_policy")?,
        pod_info_on_mount: f.bool("pod_info_on_mount")?,
        requires_republish: f.bool("requires_republish")?,
        storage_capacity: f.bool("storage_capacity")?,
        volume_lifecycle_modes: non_empty(f.string_list("volume_lifecycle_modes")?),
        ..Default::default()
    })
}

pub fn flatten_csi_driver_spec(spec: &CSIDriverSpec) -> Value {
    let mut m = Map::new();
    put(&mut m, "attach_required", spec.attach_required);
    put_str(&mut m, "fs_group_policy", spec.fs_group_policy.as_ref());
    put(&mut m, "pod_info_on_mount", spec.pod_info_on_mount);
    put(&mut m, "requires_republish", spec.requires_republish);
    put(&mut m, "storage_capacity", spec.storage_capacity);
    if let Some(v) = spec.volume_lifecycle_modes.as_ref().filter(|v| !v.is_empty()) {
        m.insert("volume_lifecycle_modes".into(), strings(v));
    }
    Value::block(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn driver_spec_round_trip() {
        let cfg = Value::from(json!({
            "attach_required": true,
            "pod_info_on_mount": true,
            "volume_lifecycle_modes": ["Ephemeral", "Persistent"]
        }));
        let spec = expand_csi_driver_spec(&Fields::root(cfg.as_map().unwrap())).unwrap();
        assert_eq!(spec.attach_required, Some(true));
        assert_eq!(flatten_csi_driver_spec(&spec), Value::List(vec![cfg]));
    }
}
