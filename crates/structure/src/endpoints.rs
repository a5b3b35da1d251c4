//! Endpoints subsets, addresses and ports.

use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort, EndpointSubset};
use tfk8s_core::{blocks_of, FieldPath, Map, Value, ValueError};

use crate::util::{non_empty, put_list, put_str};

pub fn expand_endpoints_addresses(items: &[Value], path: &FieldPath) -> Result<Vec<EndpointAddress>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(EndpointAddress {
                hostname: f.string("hostname")?,
                ip: f.str("ip")?.unwrap_or_default().to_string(),
                node_name: f.string("node_name")?,
                ..Default::default()
            })
        })
        .collect()
}

pub fn flatten_endpoints_addresses(addrs: &[EndpointAddress]) -> Value {
    Value::List(address_values(addrs))
}

fn address_values(addrs: &[EndpointAddress]) -> Vec<Value> {
    addrs
        .iter()
        .map(|a| {
            let mut m = Map::new();
            put_str(&mut m, "hostname", a.hostname.as_ref());
            m.insert("ip".into(), Value::from(a.ip.as_str()));
            if let Some(n) = &a.node_name {
                m.insert("node_name".into(), Value::from(n.as_str()));
            }
            Value::Map(m)
        })
        .collect()
}

pub fn expand_endpoints_ports(items: &[Value], path: &FieldPath) -> Result<Vec<EndpointPort>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(EndpointPort {
                name: f.string("name")?,
                port: f.i32("port")?.unwrap_or_default(),
                protocol: f.string("protocol")?,
                ..Default::default()
            })
        })
        .collect()
}

/// Port and protocol are always emitted, even when the server left them zero/empty.
pub fn flatten_endpoints_ports(ports: &[EndpointPort]) -> Value {
    Value::List(port_values(ports))
}

fn port_values(ports: &[EndpointPort]) -> Vec<Value> {
    ports
        .iter()
        .map(|p| {
            let mut m = Map::new();
            put_str(&mut m, "name", p.name.as_ref());
            m.insert("port".into(), Value::from(p.port));
            m.insert("protocol".into(), Value::from(p.protocol.clone().unwrap_or_default()));
            Value::Map(m)
        })
        .collect()
}

pub fn expand_endpoints_subsets(items: &[Value], path: &FieldPath) -> Result<Vec<EndpointSubset>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(EndpointSubset {
                addresses: non_empty(expand_endpoints_addresses(f.list("address")?, &f.path().join("address"))?),
                not_ready_addresses: non_empty(expand_endpoints_addresses(
                    f.list("not_ready_address")?,
                    &f.path().join("not_ready_address"),
                )?),
                ports: non_empty(expand_endpoints_ports(f.list("port")?, &f.path().join("port"))?),
            })
        })
        .collect()
}

pub fn flatten_endpoints_subsets(subsets: &[EndpointSubset]) -> Value {
    Value::List(
        subsets
            .iter()
            .map(|s| {
                let mut m = Map::new();
                put_list(&mut m, "address", s.addresses.as_deref().map(address_values));
                put_list(&mut m, "not_ready_address", s.not_ready_addresses.as_deref().map(address_values));
                put_list(&mut m, "port", s.ports.as_deref().map(port_values));
                Value::Map(m)
            })
            .collect(),
    )
}
