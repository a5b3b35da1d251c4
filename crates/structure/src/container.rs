//! Containers: ports, environment, mounts, probes, lifecycle hooks, resources
//! and security contexts.

use k8s_openapi::api::core::v1::{
    Capabilities, ConfigMapKeySelector, Container, ContainerPort, EnvVar, EnvVarSource, ExecAction, HTTPGetAction, HTTPHeader,
    Lifecycle, LifecycleHandler, ObjectFieldSelector, Probe, ResourceRequirements, SELinuxOptions, SecretKeySelector,
    SecurityContext, TCPSocketAction, VolumeMount,
};
use tfk8s_core::{blocks_of, FieldPath, Fields, Map, Value, ValueError};

use crate::util::{
    block_with, int_or_string, int_or_string_value, list_with, non_empty, put, put_list, put_str, quantities, quantities_value,
    string_values,
};

/// Mount point of the automatically injected service account token.
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

pub fn expand_containers(items: &[Value], path: &FieldPath) -> Result<Vec<Container>, ValueError> {
    blocks_of(items, path)?.iter().map(expand_container).collect()
}

pub fn expand_container(f: &Fields<'_>) -> Result<Container, ValueError> {
    Ok(Container {
        name: f.str("name")?.unwrap_or_default().to_string(),
        image: f.string("image")?,
        image_pull_policy: f.string("image_pull_policy")?,
        command: non_empty(f.string_list("command")?),
        args: non_empty(f.string_list("args")?),
        working_dir: f.string("working_dir")?,
        ports: list_with(f, "port", expand_container_ports)?,
        env: list_with(f, "env", expand_env)?,
        volume_mounts: list_with(f, "volume_mount", expand_volume_mounts)?,
        liveness_probe: block_with(f, "liveness_probe", expand_probe)?,
        readiness_probe: block_with(f, "readiness_probe", expand_probe)?,
        startup_probe: block_with(f, "startup_probe", expand_probe)?,
        lifecycle: block_with(f, "lifecycle", expand_lifecycle)?,
        resources: block_with(f, "resources", expand_resource_requirements)?,
        security_context: block_with(f, "security_context", expand_security_context)?,
        stdin: f.bool("stdin")?,
        tty: f.bool("tty")?,
        termination_message_path: f.string("termination_message_path")?,
        ..Default::default()
    })
}

/// Flatten containers, hiding mounts of the injected service account token.
pub fn flatten_containers(containers: &[Container]) -> Value {
    Value::List(containers.iter().map(flatten_container).collect())
}

pub fn flatten_container(c: &Container) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), Value::from(c.name.as_str()));
    put_str(&mut m, "image", c.image.as_ref());
    put_str(&mut m, "image_pull_policy", c.image_pull_policy.as_ref());
    put_list(&mut m, "command", c.command.as_ref().map(|v| string_values(v)));
    put_list(&mut m, "args", c.args.as_ref().map(|v| string_values(v)));
    put_str(&mut m, "working_dir", c.working_dir.as_ref());
    put_list(&mut m, "port", c.ports.as_ref().map(|p| p.iter().map(flatten_container_port).collect()));
    put_list(&mut m, "env", c.env.as_ref().map(|e| e.iter().map(flatten_env_var).collect()));
    put_list(
        &mut m,
        "volume_mount",
        c.volume_mounts
            .as_ref()
            .map(|v| v.iter().filter(|vm| vm.mount_path != SERVICE_ACCOUNT_TOKEN_PATH).map(flatten_volume_mount).collect()),
    );
    put(&mut m, "liveness_probe", c.liveness_probe.as_ref().map(flatten_probe));
    put(&mut m, "readiness_probe", c.readiness_probe.as_ref().map(flatten_probe));
    put(&mut m, "startup_probe", c.startup_probe.as_ref().map(flatten_probe));
    put(&mut m, "lifecycle", c.lifecycle.as_ref().map(flatten_lifecycle));
    put(&mut m, "resources", c.resources.as_ref().map(flatten_resource_requirements));
    put(&mut m, "security_context", c.security_context.as_ref().map(flatten_security_context));
    put(&mut m, "stdin", c.stdin);
    put(&mut m, "tty", c.tty);
    put_str(&mut m, "termination_message_path", c.termination_message_path.as_ref());
    Value::Map(m)
}

pub fn expand_container_ports(items: &[Value], path: &FieldPath) -> Result<Vec<ContainerPort>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(ContainerPort {
                container_port: f.i32("container_port")?.unwrap_or_default(),
                host_ip: f.string("host_ip")?,
                host_port: f.i32("host_port")?,
                name: f.string("name")?,
                protocol: f.string("protocol")?,
            })
        })
        .collect()
}

fn flatten_container_port(p: &ContainerPort) -> Value {
    let mut m = Map::new();
    m.insert("container_port".into(), Value::from(p.container_port));
    put_str(&mut m, "host_ip", p.host_ip.as_ref());
    put(&mut m, "host_port", p.host_port);
    put_str(&mut m, "name", p.name.as_ref());
    put_str(&mut m, "protocol", p.protocol.as_ref());
    Value::Map(m)
}

pub fn expand_env(items: &[Value], path: &FieldPath) -> Result<Vec<EnvVar>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(EnvVar {
                name: f.str("name")?.unwrap_or_default().to_string(),
                value: f.string("value")?,
                value_from: block_with(f, "value_from", expand_env_source)?,
            })
        })
        .collect()
}

fn expand_env_source(f: &Fields<'_>) -> Result<EnvVarSource, ValueError> {
    Ok(EnvVarSource {
        config_map_key_ref: block_with(f, "config_map_key_ref", |r| {
            Ok(ConfigMapKeySelector {
                key: r.str("key")?.unwrap_or_default().to_string(),
                name: r.string("name")?,
                optional: r.bool("optional")?,
            })
        })?,
        secret_key_ref: block_with(f, "secret_key_ref", |r| {
            Ok(SecretKeySelector {
                key: r.str("key")?.unwrap_or_default().to_string(),
                name: r.string("name")?,
                optional: r.bool("optional")?,
            })
        })?,
        field_ref: block_with(f, "field_ref", |r| {
            Ok(ObjectFieldSelector {
                api_version: r.string("api_version")?,
                field_path: r.str("field_path")?.unwrap_or_default().to_string(),
            })
        })?,
        ..Default::default()
    })
}

fn flatten_env_var(e: &EnvVar) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), Value::from(e.name.as_str()));
    put_str(&mut m, "value", e.value.as_ref());
    if let Some(src) = &e.value_from {
        let mut s = Map::new();
        let key_ref = |key: &str, name: Option<&String>, optional: Option<bool>| {
            let mut r = Map::new();
            r.insert("key".into(), Value::from(key));
            put_str(&mut r, "name", name);
            put(&mut r, "optional", optional);
            Value::block(r)
        };
        if let Some(r) = &src.config_map_key_ref {
            s.insert("config_map_key_ref".into(), key_ref(&r.key, r.name.as_ref(), r.optional));
        }
        if let Some(r) = &src.secret_key_ref {
            s.insert("secret_key_ref".into(), key_ref(&r.key, r.name.as_ref(), r.optional));
        }
        if let Some(r) = &src.field_ref {
            let mut fr = Map::new();
            put_str(&mut fr, "api_version", r.api_version.as_ref());
            fr.insert("field_path".into(), Value::from(r.field_path.as_str()));
            s.insert("field_ref".into(), Value::block(fr));
        }
        m.insert("value_from".into(), Value::block(s));
    }
    Value::Map(m)
}

pub fn expand_volume_mounts(items: &[Value], path: &FieldPath) -> Result<Vec<VolumeMount>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(VolumeMount {
                name: f.str("name")?.unwrap_or_default().to_string(),
                mount_path: f.str("mount_path")?.unwrap_or_default().to_string(),
                read_only: f.bool("read_only")?,
                sub_path: f.string("sub_path")?,
                ..Default::default()
            })
        })
        .collect()
}

fn flatten_volume_mount(v: &VolumeMount) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), Value::from(v.name.as_str()));
    m.insert("mount_path".into(), Value::from(v.mount_path.as_str()));
    put(&mut m, "read_only", v.read_only);
    put_str(&mut m, "sub_path", v.sub_path.as_ref());
    Value::Map(m)
}

pub fn expand_probe(f: &Fields<'_>) -> Result<Probe, ValueError> {
    Ok(Probe {
        exec: block_with(f, "exec", expand_exec)?,
        http_get: block_with(f, "http_get", expand_http_get)?,
        tcp_socket: block_with(f, "tcp_socket", expand_tcp_socket)?,
        initial_delay_seconds: f.i32("initial_delay_seconds")?,
        period_seconds: f.i32("period_seconds")?,
        timeout_seconds: f.i32("timeout_seconds")?,
        success_threshold: f.i32("success_threshold")?,
        failure_threshold: f.i32("failure_threshold")?,
        ..Default::default()
    })
}

pub fn flatten_probe(p: &Probe) -> Value {
    let mut m = Map::new();
    put(&mut m, "exec", p.exec.as_ref().map(flatten_exec));
    put(&mut m, "http_get", p.http_get.as_ref().map(flatten_http_get));
    put(&mut m, "tcp_socket", p.tcp_socket.as_ref().map(flatten_tcp_socket));
    put(&mut m, "initial_delay_seconds", p.initial_delay_seconds);
    put(&mut m, "period_seconds", p.period_seconds);
    put(&mut m, "timeout_seconds", p.timeout_seconds);
    put(&mut m, "success_threshold", p.success_threshold);
    put(&mut m, "failure_threshold", p.failure_threshold);
    Value::block(m)
}

fn expand_exec(f: &Fields<'_>) -> Result<ExecAction, ValueError> {
    Ok(ExecAction { command: non_empty(f.string_list("command")?) })
}

fn flatten_exec(e: &ExecAction) -> Value {
    let mut m = Map::new();
    put_list(&mut m, "command", e.command.as_ref().map(|c| string_values(c)));
    Value::block(m)
}

fn expand_http_get(f: &Fields<'_>) -> Result<HTTPGetAction, ValueError> {
    let headers = f
        .blocks("http_header")?
        .iter()
        .map(|h| {
            Ok(HTTPHeader {
                name: h.str("name")?.unwrap_or_default().to_string(),
                value: h.str("value")?.unwrap_or_default().to_string(),
            })
        })
        .collect::<Result<Vec<_>, ValueError>>()?;
    Ok(HTTPGetAction {
        host: f.string("host")?,
        path: f.string("path")?,
        port: int_or_string(f.str("port")?.unwrap_or("0")),
        scheme: f.string("scheme")?,
        http_headers: non_empty(headers),
    })
}

fn flatten_http_get(h: &HTTPGetAction) -> Value {
    let mut m = Map::new();
    put_str(&mut m, "host", h.host.as_ref());
    put_str(&mut m, "path", h.path.as_ref());
    m.insert("port".into(), int_or_string_value(&h.port));
    put_str(&mut m, "scheme", h.scheme.as_ref());
    put_list(
        &mut m,
        "http_header",
        h.http_headers.as_ref().map(|hs| {
            hs.iter()
                .map(|h| {
                    let mut hm = Map::new();
                    hm.insert("name".into(), Value::from(h.name.as_str()));
                    hm.insert("value".into(), Value::from(h.value.as_str()));
                    Value::Map(hm)
                })
                .collect()
        }),
    );
    Value::block(m)
}

fn expand_tcp_socket(f: &Fields<'_>) -> Result<TCPSocketAction, ValueError> {
    Ok(TCPSocketAction { host: f.string("host")?, port: int_or_string(f.str("port")?.unwrap_or("0")) })
}

fn flatten_tcp_socket(t: &TCPSocketAction) -> Value {
    let mut m = Map::new();
    put_str(&mut m, "host", t.host.as_ref());
    m.insert("port".into(), int_or_string_value(&t.port));
    Value::block(m)
}

pub fn expand_lifecycle(f: &Fields<'_>) -> Result<Lifecycle, ValueError> {
    Ok(Lifecycle {
        post_start: block_with(f, "post_start", expand_handler)?,
        pre_stop: block_with(f, "pre_stop", expand_handler)?,
    })
}

fn expand_handler(f: &Fields<'_>) -> Result<LifecycleHandler, ValueError> {
    Ok(LifecycleHandler {
        exec: block_with(f, "exec", expand_exec)?,
        http_get: block_with(f, "http_get", expand_http_get)?,
        tcp_socket: block_with(f, "tcp_socket", expand_tcp_socket)?,
        ..Default::default()
    })
}

pub fn flatten_lifecycle(l: &Lifecycle) -> Value {
    let handler = |h: &LifecycleHandler| {
        let mut m = Map::new();
        put(&mut m, "exec", h.exec.as_ref().map(flatten_exec));
        put(&mut m, "http_get", h.http_get.as_ref().map(flatten_http_get));
        put(&mut m, "tcp_socket", h.tcp_socket.as_ref().map(flatten_tcp_socket));
        Value::block(m)
    };
    let mut m = Map::new();
    put(&mut m, "post_start", l.post_start.as_ref().map(handler));
    put(&mut m, "pre_stop", l.pre_stop.as_ref().map(handler));
    Value::block(m)
}

pub fn expand_resource_requirements(f: &Fields<'_>) -> Result<ResourceRequirements, ValueError> {
    Ok(ResourceRequirements {
        limits: quantities(f.string_map("limits")?),
        requests: quantities(f.string_map("requests")?),
        ..Default::default()
    })
}

pub fn flatten_resource_requirements(r: &ResourceRequirements) -> Value {
    let mut m = Map::new();
    if let Some(l) = r.limits.as_ref().filter(|l| !l.is_empty()) {
        m.insert("limits".into(), quantities_value(l));
    }
    if let Some(q) = r.requests.as_ref().filter(|q| !q.is_empty()) {
        m.insert("requests".into(), quantities_value(q));
    }
    Value::block(m)
}

pub fn expand_security_context(f: &Fields<'_>) -> Result<SecurityContext, ValueError> {
    Ok(SecurityContext {
        allow_privilege_escalation: f.bool("allow_privilege_escalation")?,
        privileged: f.bool("privileged")?,
        read_only_root_filesystem: f.bool("read_only_root_filesystem")?,
        run_as_non_root: f.bool("run_as_non_root")?,
        run_as_user: f.int("run_as_user")?,
        run_as_group: f.int("run_as_group")?,
        capabilities: block_with(f, "capabilities", |c| {
            Ok(Capabilities { add: non_empty(c.string_list("add")?), drop: non_empty(c.string_list("drop")?) })
        })?,
        se_linux_options: block_with(f, "se_linux_options", expand_se_linux_options)?,
        ..Default::default()
    })
}

pub fn flatten_security_context(s: &SecurityContext) -> Value {
    let mut m = Map::new();
    put(&mut m, "allow_privilege_escalation", s.allow_privilege_escalation);
    put(&mut m, "privileged", s.privileged);
    put(&mut m, "read_only_root_filesystem", s.read_only_root_filesystem);
    put(&mut m, "run_as_non_root", s.run_as_non_root);
    put(&mut m, "run_as_user", s.run_as_user);
    put(&mut m, "run_as_group", s.run_as_group);
    if let Some(c) = &s.capabilities {
        let mut cm = Map::new();
        put_list(&mut cm, "add", c.add.as_ref().map(|v| string_values(v)));
        put_list(&mut cm, "drop", c.drop.as_ref().map(|v| string_values(v)));
        m.insert("capabilities".into(), Value::block(cm));
    }
    put(&mut m, "se_linux_options", s.se_linux_options.as_ref().map(flatten_se_linux_options));
    Value::block(m)
}

pub(crate) fn expand_se_linux_options(f: &Fields<'_>) -> Result<SELinuxOptions, ValueError> {
    Ok(SELinuxOptions {
        level: f.string("level")?,
        role: f.string("role")?,
        type_: f.string("type")?,
        user: f.string("user")?,
    })
}

pub(crate) fn flatten_se_linux_options(o: &SELinuxOptions) -> Value {
    let mut m = Map::new();
    put_str(&mut m, "level", o.level.as_ref());
    put_str(&mut m, "role", o.role.as_ref());
    put_str(&mut m, "type", o.type_.as_ref());
    put_str(&mut m, "user", o.user.as_ref());
    Value::block(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use serde_json::json;

    fn container(j: serde_json::Value) -> (Value, Container) {
        let v = Value::from(j);
        let c = expand_container(&Fields::root(v.as_map().unwrap())).unwrap();
        (v, c)
    }

    #[test]
    fn minimal_container() {
        let (v, c) = container(json!({"name": "web", "image": "nginx:1.25"}));
        assert_eq!(c.name, "web");
        assert_eq!(c.image.as_deref(), Some("nginx:1.25"));
        assert!(c.ports.is_none() && c.env.is_none() && c.resources.is_none());
        assert_eq!(flatten_container(&c), v);
    }

    #[test]
    fn full_container_round_trips() {
        let (v, c) = container(json!({
            "name": "api",
            "image": "registry.local/api:2",
            "image_pull_policy": "IfNotPresent",
            "command": ["/bin/api"],
            "args": ["--port", "8080"],
            "port": [{"container_port": 8080, "name": "http", "protocol": "TCP"}],
            "env": [
                {"name": "MODE", "value": "prod"},
                {"name": "TOKEN", "value_from": [{"secret_key_ref": [{"key": "token", "name": "api-secrets"}]}]},
                {"name": "POD_IP", "value_from": [{"field_ref": [{"field_path": "status.podIP"}]}]}
            ],
            "volume_mount": [{"name": "data", "mount_path": "/data", "read_only": true}],
            "liveness_probe": [{
                "http_get": [{"path": "/healthz", "port": "http", "http_header": [{"name": "X-Probe", "value": "1"}]}],
                "initial_delay_seconds": 5,
                "period_seconds": 10
            }],
            "readiness_probe": [{"tcp_socket": [{"port": "8080"}]}],
            "lifecycle": [{"pre_stop": [{"exec": [{"command": ["sleep", "5"]}]}]}],
            "resources": [{"limits": {"cpu": "500m", "memory": "512Mi"}, "requests": {"cpu": "250m"}}],
            "security_context": [{
                "run_as_non_root": true,
                "run_as_user": 1000,
                "capabilities": [{"drop": ["ALL"]}],
                "se_linux_options": [{"type": "spc_t"}]
            }]
        }));
        let http = c.liveness_probe.as_ref().and_then(|p| p.http_get.as_ref()).unwrap();
        assert_eq!(http.port, IntOrString::String("http".into()));
        let tcp = c.readiness_probe.as_ref().and_then(|p| p.tcp_socket.as_ref()).unwrap();
        assert_eq!(tcp.port, IntOrString::Int(8080));
        assert_eq!(c.resources.as_ref().and_then(|r| r.limits.as_ref()).map(|l| l["cpu"].0.as_str()), Some("500m"));
        assert_eq!(c.security_context.as_ref().and_then(|s| s.run_as_user), Some(1000));
        assert_eq!(flatten_container(&c), v);
    }

    #[test]
    fn injected_token_mount_is_hidden() {
        let c = Container {
            name: "web".into(),
            volume_mounts: Some(vec![
                VolumeMount { name: "data".into(), mount_path: "/data".into(), ..Default::default() },
                VolumeMount { name: "kube-api-access-x7k2p".into(), mount_path: SERVICE_ACCOUNT_TOKEN_PATH.into(), ..Default::default() },
            ]),
            ..Default::default()
        };
        assert_eq!(
            flatten_container(&c),
            Value::from(json!({"name": "web", "volume_mount": [{"name": "data", "mount_path": "/data"}]}))
        );
    }

    #[test]
    fn empty_resources_block_survives() {
        let (v, c) = container(json!({"name": "x", "resources": [{}]}));
        assert_eq!(c.resources, Some(ResourceRequirements::default()));
        assert_eq!(flatten_container(&c), v);
    }
}
