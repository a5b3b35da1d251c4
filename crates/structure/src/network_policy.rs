//! Network policy spec: pod selector, ingress/egress rules, peers and ports.

use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort, NetworkPolicySpec,
};
use tfk8s_core::{blocks_of, FieldPath, Fields, Map, Value, ValueError};

use crate::selector::{expand_label_selector, flatten_label_selector};
use crate::util::{int_or_string, int_or_string_value, non_empty, put, put_list, put_str, strings};

pub fn expand_network_policy_spec(f: &Fields<'_>) -> Result<NetworkPolicySpec, ValueError> {
    Ok(NetworkPolicySpec {
        pod_selector: f.block("pod_selector")?.map(|s| expand_label_selector(&s)).transpose()?.unwrap_or_default(),
        ingress: non_empty(expand_ingress_rules(f.list("ingress")?, &f.path().join("ingress"))?),
        egress: non_empty(expand_egress_rules(f.list("egress")?, &f.path().join("egress"))?),
        policy_types: non_empty(f.string_list("policy_types")?),
    })
}

/// `ingress` is always emitted (possibly empty); `egress` and `policy_types` only when set.
pub fn flatten_network_policy_spec(spec: &NetworkPolicySpec) -> Value {
    let mut m = Map::new();
    m.insert("pod_selector".into(), flatten_label_selector(&spec.pod_selector));
    m.insert("ingress".into(), flatten_ingress_rules(spec.ingress.as_deref().unwrap_or_default()));
    put_list(&mut m, "egress", spec.egress.as_deref().map(egress_values));
    if let Some(t) = spec.policy_types.as_ref().filter(|t| !t.is_empty()) {
        m.insert("policy_types".into(), strings(t));
    }
    Value::block(m)
}

pub fn expand_ingress_rules(items: &[Value], path: &FieldPath) -> Result<Vec<NetworkPolicyIngressRule>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(NetworkPolicyIngressRule {
                ports: non_empty(expand_policy_ports(f.list("ports")?, &f.path().join("ports"))?),
                from: non_empty(expand_peers(f.list("from")?, &f.path().join("from"))?),
            })
        })
        .collect()
}

pub fn flatten_ingress_rules(rules: &[NetworkPolicyIngressRule]) -> Value {
    Value::List(
        rules
            .iter()
            .map(|r| {
                let mut m = Map::new();
                put_list(&mut m, "ports", r.ports.as_deref().map(port_values));
                put_list(&mut m, "from", r.from.as_deref().map(peer_values));
                Value::Map(m)
            })
            .collect(),
    )
}

pub fn expand_egress_rules(items: &[Value], path: &FieldPath) -> Result<Vec<NetworkPolicyEgressRule>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(NetworkPolicyEgressRule {
                ports: non_empty(expand_policy_ports(f.list("ports")?, &f.path().join("ports"))?),
                to: non_empty(expand_peers(f.list("to")?, &f.path().join("to"))?),
            })
        })
        .collect()
}

pub fn flatten_egress_rules(rules: &[NetworkPolicyEgressRule]) -> Value {
    Value::List(egress_values(rules))
}

fn egress_values(rules: &[NetworkPolicyEgressRule]) -> Vec<Value> {
    rules
        .iter()
        .map(|r| {
            let mut m = Map::new();
            put_list(&mut m, "ports", r.ports.as_deref().map(port_values));
            put_list(&mut m, "to", r.to.as_deref().map(peer_values));
            Value::Map(m)
        })
        .collect()
}

pub fn expand_policy_ports(items: &[Value], path: &FieldPath) -> Result<Vec<NetworkPolicyPort>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(NetworkPolicyPort {
                port: f.string("port")?.as_deref().map(int_or_string),
                protocol: f.string("protocol")?,
                end_port: f.i32("end_port")?,
            })
        })
        .collect()
}

fn port_values(ports: &[NetworkPolicyPort]) -> Vec<Value> {
    ports
        .iter()
        .map(|p| {
            let mut m = Map::new();
            if let Some(port) = &p.port {
                m.insert("port".into(), int_or_string_value(port));
            }
            put_str(&mut m, "protocol", p.protocol.as_ref());
            put(&mut m, "end_port", p.end_port);
            Value::Map(m)
        })
        .collect()
}

pub fn expand_peers(items: &[Value], path: &FieldPath) -> Result<Vec<NetworkPolicyPeer>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(NetworkPolicyPeer {
                ip_block: f.block("ip_block")?.map(|b| expand_ip_block(&b)).transpose()?,
                namespace_selector: f.block("namespace_selector")?.map(|s| expand_label_selector(&s)).transpose()?,
                pod_selector: f.block("pod_selector")?.map(|s| expand_label_selector(&s)).transpose()?,
            })
        })
        .collect()
}

fn expand_ip_block(f: &Fields<'_>) -> Result<IPBlock, ValueError> {
    Ok(IPBlock { cidr: f.str("cidr")?.unwrap_or_default().to_string(), except: non_empty(f.string_list("except")?) })
}

fn peer_values(peers: &[NetworkPolicyPeer]) -> Vec<Value> {
    peers
        .iter()
        .map(|p| {
            let mut m = Map::new();
            if let Some(b) = &p.ip_block {
                let mut ip = Map::new();
                ip.insert("cidr".into(), Value::from(b.cidr.as_str()));
                if let Some(e) = b.except.as_ref().filter(|e| !e.is_empty()) {
                    ip.insert("except".into(), strings(e));
                }
                m.insert("ip_block".into(), Value::block(ip));
            }
            if let Some(s) = &p.namespace_selector {
                m.insert("namespace_selector".into(), flatten_label_selector(s));
            }
            if let Some(s) = &p.pod_selector {
                m.insert("pod_selector".into(), flatten_label_selector(s));
            }
            Value::Map(m)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use serde_json::json;

    fn spec_of(j: serde_json::Value) -> NetworkPolicySpec {
        let v = Value::from(j);
        expand_network_policy_spec(&Fields::root(v.as_map().unwrap())).unwrap()
    }

    #[test]
    fn deny_all_keeps_empty_ingress() {
        let spec = spec_of(json!({"pod_selector": [{}], "policy_types": ["Ingress"]}));
        assert!(spec.ingress.is_none());
        assert_eq!(
            flatten_network_policy_spec(&spec),
            Value::from(json!([{"pod_selector": [{}], "ingress": [], "policy_types": ["Ingress"]}]))
        );
    }

    #[test]
    fn rules_with_peers_and_ports() {
        let cfg = json!({
            "pod_selector": [{"match_labels": {"app": "db"}}],
            "ingress": [{
                "ports": [{"port": "http", "protocol": "TCP"}, {"port": "8125", "protocol": "UDP"}],
                "from": [
                    {"namespace_selector": [{"match_labels": {"name": "default"}}]},
                    {"ip_block": [{"cidr": "10.0.0.0/8", "except": ["10.0.0.0/24", "10.0.1.0/24"]}]}
                ]
            }],
            "egress": [{"ports": [{"port": "6000", "end_port": 6100}], "to": [{"ip_block": [{"cidr": "10.0.0.0/8"}]}]}],
            "policy_types": ["Ingress", "Egress"]
        });
        let spec = spec_of(cfg.clone());
        let ports = spec.ingress.as_ref().unwrap()[0].ports.as_ref().unwrap();
        assert_eq!(ports[0].port, Some(IntOrString::String("http".into())));
        assert_eq!(ports[1].port, Some(IntOrString::Int(8125)));
        let egress = &spec.egress.as_ref().unwrap()[0];
        assert_eq!(egress.ports.as_ref().unwrap()[0].end_port, Some(6100));
        assert_eq!(flatten_network_policy_spec(&spec), Value::List(vec![Value::from(cfg)]));
    }
}
