//! Pod specs and pod-level security contexts.

use k8s_openapi::api::core::v1::{PodSecurityContext, PodSpec, Toleration};
use tfk8s_core::{blocks_of, FieldPath, Fields, Map, Value, ValueError};

use crate::container::{expand_containers, expand_se_linux_options, flatten_containers, flatten_se_linux_options};
use crate::util::{block_with, i64_list, list_with, non_empty, non_empty_map, put, put_list, put_str, string_map};
use crate::volume::{expand_volumes, volume_values};

pub fn expand_pod_spec(f: &Fields<'_>) -> Result<PodSpec, ValueError> {
    Ok(PodSpec {
        active_deadline_seconds: f.int("active_deadline_seconds")?,
        automount_service_account_token: f.bool("automount_service_account_token")?,
        containers: expand_containers(f.list("container")?, &f.path().join("container"))?,
        init_containers: list_with(f, "init_container", expand_containers)?,
        dns_policy: f.string("dns_policy")?,
        host_ipc: f.bool("host_ipc")?,
        host_network: f.bool("host_network")?,
        host_pid: f.bool("host_pid")?,
        hostname: f.string("hostname")?,
        node_name: f.string("node_name")?,
        node_selector: non_empty_map(f.string_map("node_selector")?),
        priority_class_name: f.string("priority_class_name")?,
        restart_policy: f.string("restart_policy")?,
        scheduler_name: f.string("scheduler_name")?,
        security_context: block_with(f, "security_context", expand_pod_security_context)?,
        service_account_name: f.string("service_account_name")?,
        subdomain: f.string("subdomain")?,
        termination_grace_period_seconds: f.int("termination_grace_period_seconds")?,
        tolerations: list_with(f, "toleration", expand_tolerations)?,
        volumes: list_with(f, "volume", expand_volumes)?,
        ..Default::default()
    })
}

/// Flatten a pod spec as a single block. `container` is always present.
pub fn flatten_pod_spec(spec: &PodSpec) -> Value {
    let mut m = Map::new();
    put(&mut m, "active_deadline_seconds", spec.active_deadline_seconds);
    put(&mut m, "automount_service_account_token", spec.automount_service_account_token);
    m.insert("container".into(), flatten_containers(&spec.containers));
    if let Some(c) = spec.init_containers.as_ref().filter(|c| !c.is_empty()) {
        m.insert("init_container".into(), flatten_containers(c));
    }
    put_str(&mut m, "dns_policy", spec.dns_policy.as_ref());
    put(&mut m, "host_ipc", spec.host_ipc);
    put(&mut m, "host_network", spec.host_network);
    put(&mut m, "host_pid", spec.host_pid);
    put_str(&mut m, "hostname", spec.hostname.as_ref());
    put_str(&mut m, "node_name", spec.node_name.as_ref());
    if let Some(n) = spec.node_selector.as_ref().filter(|n| !n.is_empty()) {
        m.insert("node_selector".into(), string_map(n));
    }
    put_str(&mut m, "priority_class_name", spec.priority_class_name.as_ref());
    put_str(&mut m, "restart_policy", spec.restart_policy.as_ref());
    put_str(&mut m, "scheduler_name", spec.scheduler_name.as_ref());
    put(&mut m, "security_context", spec.security_context.as_ref().map(flatten_pod_security_context));
    put_str(&mut m, "service_account_name", spec.service_account_name.as_ref());
    put_str(&mut m, "subdomain", spec.subdomain.as_ref());
    put(&mut m, "termination_grace_period_seconds", spec.termination_grace_period_seconds);
    put_list(&mut m, "toleration", spec.tolerations.as_deref().map(toleration_values));
    put_list(&mut m, "volume", spec.volumes.as_deref().map(volume_values));
    Value::block(m)
}

pub fn expand_pod_security_context(f: &Fields<'_>) -> Result<PodSecurityContext, ValueError> {
    Ok(PodSecurityContext {
        fs_group: f.int("fs_group")?,
        run_as_group: f.int("run_as_group")?,
        run_as_non_root: f.bool("run_as_non_root")?,
        run_as_user: f.int("run_as_user")?,
        se_linux_options: block_with(f, "se_linux_options", expand_se_linux_options)?,
        supplemental_groups: non_empty(f.int_list("supplemental_groups")?),
        ..Default::default()
    })
}

pub fn flatten_pod_security_context(s: &PodSecurityContext) -> Value {
    let mut m = Map::new();
    put(&mut m, "fs_group", s.fs_group);
    put(&mut m, "run_as_group", s.run_as_group);
    put(&mut m, "run_as_non_root", s.run_as_non_root);
    put(&mut m, "run_as_user", s.run_as_user);
    put(&mut m, "se_linux_options", s.se_linux_options.as_ref().map(flatten_se_linux_options));
    if let Some(g) = s.supplemental_groups.as_ref().filter(|g| !g.is_empty()) {
        m.insert("supplemental_groups".into(), i64_list(g));
    }
    Value::block(m)
}

fn expand_tolerations(items: &[Value], path: &FieldPath) -> Result<Vec<Toleration>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(Toleration {
                effect: f.string("effect")?,
                key: f.string("key")?,
                operator: f.string("operator")?,
                toleration_seconds: f.int("toleration_seconds")?,
                value: f.string("value")?,
            })
        })
        .collect()
}

fn toleration_values(tolerations: &[Toleration]) -> Vec<Value> {
    tolerations
        .iter()
        .map(|t| {
            let mut m = Map::new();
            put_str(&mut m, "effect", t.effect.as_ref());
            put_str(&mut m, "key", t.key.as_ref());
            put_str(&mut m, "operator", t.operator.as_ref());
            put(&mut m, "toleration_seconds", t.toleration_seconds);
            put_str(&mut m, "value", t.value.as_ref());
            Value::Map(m)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, Volume, VolumeMount};
    use serde_json::json;

    fn spec(j: serde_json::Value) -> (Value, PodSpec) {
        let v = Value::from(j);
        let s = expand_pod_spec(&Fields::root(v.as_map().unwrap())).unwrap();
        (v, s)
    }

    #[test]
    fn pod_spec_round_trip() {
        let (v, s) = spec(json!({
            "container": [{"name": "web", "image": "nginx", "volume_mount": [{"name": "conf", "mount_path": "/etc/nginx"}]}],
            "init_container": [{"name": "init", "image": "busybox", "command": ["sh", "-c", "true"]}],
            "restart_policy": "Always",
            "node_selector": {"disktype": "ssd"},
            "security_context": [{"run_as_non_root": true, "fs_group": 2000, "supplemental_groups": [3000, 4000]}],
            "toleration": [{"key": "dedicated", "operator": "Equal", "value": "web", "effect": "NoSchedule"}],
            "termination_grace_period_seconds": 30,
            "volume": [{"name": "conf", "config_map": [{"name": "nginx", "default_mode": "0420"}]}]
        }));
        assert_eq!(s.containers.len(), 1);
        assert_eq!(s.security_context.as_ref().and_then(|c| c.supplemental_groups.clone()), Some(vec![3000, 4000]));
        assert_eq!(flatten_pod_spec(&s), Value::List(vec![v]));
    }

    #[test]
    fn server_injected_token_is_not_reported() {
        let s = PodSpec {
            containers: vec![Container {
                name: "web".into(),
                volume_mounts: Some(vec![VolumeMount {
                    name: "kube-api-access-x7k2p".into(),
                    mount_path: crate::container::SERVICE_ACCOUNT_TOKEN_PATH.into(),
                    read_only: Some(true),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            volumes: Some(vec![Volume { name: "kube-api-access-x7k2p".into(), ..Default::default() }]),
            ..Default::default()
        };
        assert_eq!(flatten_pod_spec(&s), Value::from(json!([{"container": [{"name": "web"}]}])));
    }
}
