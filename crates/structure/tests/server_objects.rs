//! Expand a configuration, let a fake server touch the wire object, flatten it back.

use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::api::networking::v1::NetworkPolicySpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{json, Value as Json};
use tfk8s_core::{FieldPath, Fields, Value};
use tfk8s_structure::{expand_metadata, flatten_metadata, network_policy, pod};

fn fields(v: &Value) -> Fields<'_> { Fields::of(v, FieldPath::root()).unwrap() }

/// Serialize, let `server` mutate the JSON, deserialize.
fn through_server<T: serde::Serialize + serde::de::DeserializeOwned>(obj: &T, server: impl FnOnce(&mut Json)) -> T {
    let mut wire = serde_json::to_value(obj).unwrap();
    server(&mut wire);
    serde_json::from_value(wire).unwrap()
}

#[test]
fn pod_spec_hides_injected_token_volume() {
    let cfg = Value::from(json!({
        "container": [{
            "name": "web",
            "image": "nginx:1.25",
            "volume_mount": [{"name": "data", "mount_path": "/data"}]
        }],
        "volume": [{"name": "data", "empty_dir": [{}]}]
    }));
    let spec = pod::expand_pod_spec(&fields(&cfg)).unwrap();
    let live: PodSpec = through_server(&spec, |w| {
        w["volumes"].as_array_mut().unwrap().push(json!({"name": "kube-api-access-7xk2p", "projected": {"sources": []}}));
        let c = &mut w["containers"][0];
        c["volumeMounts"].as_array_mut().unwrap().push(json!({
            "name": "kube-api-access-7xk2p",
            "mountPath": "/var/run/secrets/kubernetes.io/serviceaccount",
            "readOnly": true
        }));
        c["imagePullPolicy"] = json!("IfNotPresent");
        w["dnsPolicy"] = json!("ClusterFirst");
    });
    let flat = pod::flatten_pod_spec(&live);
    assert_eq!(flat.pointer("0.volume"), cfg.pointer("volume"));
    assert_eq!(flat.pointer("0.container.0.volume_mount"), cfg.pointer("container.0.volume_mount"));
    // server defaults surface in the flattened state
    assert_eq!(flat.pointer("0.container.0.image_pull_policy").and_then(Value::as_str), Some("IfNotPresent"));
    assert_eq!(flat.pointer("0.dns_policy").and_then(Value::as_str), Some("ClusterFirst"));
}

#[test]
fn network_policy_spec_survives_the_wire() {
    let cfg = Value::from(json!({
        "pod_selector": [{"match_labels": {"role": "db"}}],
        "ingress": [{
            "ports": [{"port": "5432", "protocol": "TCP"}],
            "from": [{"ip_block": [{"cidr": "10.0.0.0/8", "except": ["10.1.0.0/16"]}]}]
        }],
        "policy_types": ["Ingress"]
    }));
    let spec = network_policy::expand_network_policy_spec(&fields(&cfg)).unwrap();
    let live: NetworkPolicySpec = through_server(&spec, |_| {});
    assert_eq!(serde_json::to_value(&live).unwrap()["ingress"][0]["ports"][0]["port"], json!(5432));
    let flat = network_policy::flatten_network_policy_spec(&live);
    assert_eq!(flat.pointer("0.pod_selector"), cfg.pointer("pod_selector"));
    assert_eq!(flat.pointer("0.ingress.0.ports.0.port").and_then(Value::as_str), Some("5432"));
    assert_eq!(flat.pointer("0.ingress.0.from"), cfg.pointer("ingress.0.from"));
    assert_eq!(flat.pointer("0.policy_types"), cfg.pointer("policy_types"));
}

#[test]
fn metadata_keeps_only_configured_internal_keys() {
    let cfg = Value::from(json!({
        "name": "web",
        "namespace": "apps",
        "annotations": {"app.kubernetes.io/managed-by": "tfk8s", "team": "core"}
    }));
    let meta = expand_metadata(&fields(&cfg)).unwrap();
    let live: ObjectMeta = through_server(&meta, |w| {
        w["annotations"]["kubectl.kubernetes.io/last-applied-configuration"] = json!("{}");
        w["labels"] = json!({"pod-template-hash": "5d9f"});
        w["uid"] = json!("0b1c");
        w["resourceVersion"] = json!("42");
    });
    let flat = flatten_metadata(&live, Some(&fields(&cfg)));
    let annotations = flat.pointer("0.annotations").and_then(Value::as_map).unwrap();
    assert_eq!(annotations.keys().map(String::as_str).collect::<Vec<_>>(), vec!["app.kubernetes.io/managed-by", "team"]);
    assert_eq!(flat.pointer("0.labels").and_then(|l| l.as_map()).map(|l| l.len()), Some(1));
    assert_eq!(flat.pointer("0.uid").and_then(Value::as_str), Some("0b1c"));
    assert_eq!(flat.pointer("0.resource_version").and_then(Value::as_str), Some("42"));
}
