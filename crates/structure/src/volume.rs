//! Pod volumes and their sources.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, HostPathVolumeSource, KeyToPath, PersistentVolumeClaimVolumeSource,
    SecretVolumeSource, Volume,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tfk8s_core::{blocks_of, FieldPath, Map, Value, ValueError};

use crate::util::{block_with, list_with, mode_bits, mode_bits_value, put, put_list, put_str};

/// Token volumes the API server injects into every pod.
pub fn is_injected_token_volume(name: &str) -> bool {
    name.starts_with("default-token-") || name.starts_with("kube-api-access-")
}

pub fn expand_volumes(items: &[Value], path: &FieldPath) -> Result<Vec<Volume>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(Volume {
                name: f.str("name")?.unwrap_or_default().to_string(),
                empty_dir: block_with(f, "empty_dir", |e| {
                    Ok(EmptyDirVolumeSource { medium: e.string("medium")?, size_limit: e.string("size_limit")?.map(Quantity) })
                })?,
                secret: block_with(f, "secret", |s| {
                    Ok(SecretVolumeSource {
                        secret_name: s.string("secret_name")?,
                        default_mode: mode_bits(s, "default_mode")?,
                        optional: s.bool("optional")?,
                        items: list_with(s, "items", expand_key_to_paths)?,
                    })
                })?,
                config_map: block_with(f, "config_map", |c| {
                    Ok(ConfigMapVolumeSource {
                        name: c.string("name")?,
                        default_mode: mode_bits(c, "default_mode")?,
                        optional: c.bool("optional")?,
                        items: list_with(c, "items", expand_key_to_paths)?,
                    })
                })?,
                persistent_volume_claim: block_with(f, "persistent_volume_claim", |p| {
                    Ok(PersistentVolumeClaimVolumeSource {
                        claim_name: p.str("claim_name")?.unwrap_or_default().to_string(),
                        read_only: p.bool("read_only")?,
                    })
                })?,
                host_path: block_with(f, "host_path", |h| {
                    Ok(HostPathVolumeSource { path: h.str("path")?.unwrap_or_default().to_string(), type_: h.string("type")? })
                })?,
                ..Default::default()
            })
        })
        .collect()
}

fn expand_key_to_paths(items: &[Value], path: &FieldPath) -> Result<Vec<KeyToPath>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(KeyToPath {
                key: f.str("key")?.unwrap_or_default().to_string(),
                path: f.str("path")?.unwrap_or_default().to_string(),
                mode: mode_bits(f, "mode")?,
            })
        })
        .collect()
}

/// Flatten volumes, skipping injected service account token volumes.
pub fn flatten_volumes(volumes: &[Volume]) -> Value {
    Value::List(volume_values(volumes))
}

pub(crate) fn volume_values(volumes: &[Volume]) -> Vec<Value> {
    volumes.iter().filter(|v| !is_injected_token_volume(&v.name)).map(flatten_volume).collect()
}

fn flatten_volume(v: &Volume) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), Value::from(v.name.as_str()));
    if let Some(e) = &v.empty_dir {
        let mut em = Map::new();
        put_str(&mut em, "medium", e.medium.as_ref());
        put_str(&mut em, "size_limit", e.size_limit.as_ref().map(|q| &q.0));
        m.insert("empty_dir".into(), Value::block(em));
    }
    if let Some(s) = &v.secret {
        let mut sm = Map::new();
        put_str(&mut sm, "secret_name", s.secret_name.as_ref());
        put(&mut sm, "default_mode", s.default_mode.map(mode_bits_value));
        put(&mut sm, "optional", s.optional);
        put_list(&mut sm, "items", s.items.as_deref().map(key_to_path_values));
        m.insert("secret".into(), Value::block(sm));
    }
    if let Some(c) = &v.config_map {
        let mut cm = Map::new();
        put_str(&mut cm, "name", c.name.as_ref());
        put(&mut cm, "default_mode", c.default_mode.map(mode_bits_value));
        put(&mut cm, "optional", c.optional);
        put_list(&mut cm, "items", c.items.as_deref().map(key_to_path_values));
        m.insert("config_map".into(), Value::block(cm));
    }
    if let Some(p) = &v.persistent_volume_claim {
        let mut pm = Map::new();
        pm.insert("claim_name".into(), Value::from(p.claim_name.as_str()));
        put(&mut pm, "read_only", p.read_only);
        m.insert("persistent_volume_claim".into(), Value::block(pm));
    }
    if let Some(h) = &v.host_path {
        let mut hm = Map::new();
        hm.insert("path".into(), Value::from(h.path.as_str()));
        put_str(&mut hm, "type", h.type_.as_ref());
        m.insert("host_path".into(), Value::block(hm));
    }
    Value::Map(m)
}

fn key_to_path_values(items: &[KeyToPath]) -> Vec<Value> {
    items
        .iter()
        .map(|k| {
            let mut m = Map::new();
            m.insert("key".into(), Value::from(k.key.as_str()));
            m.insert("path".into(), Value::from(k.path.as_str()));
            put(&mut m, "mode", k.mode.map(mode_bits_value));
            Value::Map(m)
        })
        .collect()
}
