//! Field schemas shared between kinds.

use tfk8s_schema::{validate_mode_bits, Field, FieldType, Schema};

pub fn metadata_schema(namespaced: bool) -> Schema {
    let s = Schema::new()
        .field("annotations", Field::map())
        .field("labels", Field::map())
        .field("generate_name", Field::string().force_new())
        .field("name", Field::string().force_new())
        .field("generation", Field::int().computed())
        .field("resource_version", Field::string().computed())
        .field("uid", Field::string().computed());
    if namespaced { s.field("namespace", Field::string().force_new()) } else { s }
}

/// Required single `metadata` block.
pub fn metadata_field(namespaced: bool) -> Field {
    Field::block(metadata_schema(namespaced)).required().min_items(1)
}

pub fn label_selector_schema() -> Schema {
    Schema::new().field("match_labels", Field::map()).field(
        "match_expressions",
        Field::blocks(
            Schema::new()
                .field("key", Field::string().required())
                .field("operator", Field::string().required())
                .field("values", Field::strings()),
        ),
    )
}

fn se_linux_options_schema() -> Schema {
    Schema::new()
        .field("level", Field::string())
        .field("role", Field::string())
        .field("type", Field::string())
        .field("user", Field::string())
}

fn handler_schema() -> Schema {
    Schema::new()
        .field("exec", Field::block(Schema::new().field("command", Field::strings())))
        .field(
            "http_get",
            Field::block(
                Schema::new()
                    .field("host", Field::string())
                    .field("path", Field::string())
                    .field("port", Field::string().required())
                    .field("scheme", Field::string())
                    .field(
                        "http_header",
                        Field::blocks(Schema::new().field("name", Field::string().required()).field("value", Field::string().required())),
                    ),
            ),
        )
        .field("tcp_socket", Field::block(Schema::new().field("host", Field::string()).field("port", Field::string().required())))
}

fn probe_schema() -> Schema {
    handler_schema()
        .field("initial_delay_seconds", Field::int())
        .field("period_seconds", Field::int())
        .field("timeout_seconds", Field::int())
        .field("success_threshold", Field::int())
        .field("failure_threshold", Field::int())
}

fn key_ref_schema() -> Schema {
    Schema::new()
        .field("key", Field::string().required())
        .field("name", Field::string())
        .field("optional", Field::bool())
}

pub fn container_schema() -> Schema {
    Schema::new()
        .field("name", Field::string().required())
        .field("image", Field::string())
        .field("image_pull_policy", Field::string().computed())
        .field("command", Field::strings())
        .field("args", Field::strings())
        .field("working_dir", Field::string())
        .field(
            "port",
            Field::blocks(
                Schema::new()
                    .field("container_port", Field::int().required())
                    .field("host_ip", Field::string())
                    .field("host_port", Field::int())
                    .field("name", Field::string())
                    .field("protocol", Field::string()),
            ),
        )
        .field(
            "env",
            Field::blocks(
                Schema::new().field("name", Field::string().required()).field("value", Field::string()).field(
                    "value_from",
                    Field::block(
                        Schema::new()
                            .field("config_map_key_ref", Field::block(key_ref_schema()))
                            .field("secret_key_ref", Field::block(key_ref_schema()))
                            .field(
                                "field_ref",
                                Field::block(
                                    Schema::new()
                                        .field("api_version", Field::string())
                                        .field("field_path", Field::string().required()),
                                ),
                            ),
                    ),
                ),
            ),
        )
        .field(
            "volume_mount",
            Field::blocks(
                Schema::new()
                    .field("name", Field::string().required())
                    .field("mount_path", Field::string().required())
                    .field("read_only", Field::bool())
                    .field("sub_path", Field::string()),
            ),
        )
        .field("liveness_probe", Field::block(probe_schema()))
        .field("readiness_probe", Field::block(probe_schema()))
        .field("startup_probe", Field::block(probe_schema()))
        .field(
            "lifecycle",
            Field::block(Schema::new().field("post_start", Field::block(handler_schema())).field("pre_stop", Field::block(handler_schema()))),
        )
        .field("resources", Field::block(Schema::new().field("limits", Field::map()).field("requests", Field::map())))
        .field(
            "security_context",
            Field::block(
                Schema::new()
                    .field("allow_privilege_escalation", Field::bool())
                    .field("privileged", Field::bool())
                    .field("read_only_root_filesystem", Field::bool())
                    .field("run_as_non_root", Field::bool())
                    .field("run_as_user", Field::int())
                    .field("run_as_group", Field::int())
                    .field("capabilities", Field::block(Schema::new().field("add", Field::strings()).field("drop", Field::strings())))
                    .field("se_linux_options", Field::block(se_linux_options_schema())),
            ),
        )
        .field("stdin", Field::bool())
        .field("tty", Field::bool())
        .field("termination_message_path", Field::string())
}

fn key_to_path_schema() -> Schema {
    Schema::new()
        .field("key", Field::string().required())
        .field("path", Field::string().required())
        .field("mode", Field::string().validate(validate_mode_bits))
}

pub fn volume_schema() -> Schema {
    Schema::new()
        .field("name", Field::string().required())
        .field("empty_dir", Field::block(Schema::new().field("medium", Field::string()).field("size_limit", Field::string())))
        .field(
            "secret",
            Field::block(
                Schema::new()
                    .field("secret_name", Field::string())
                    .field("default_mode", Field::string().validate(validate_mode_bits))
                    .field("optional", Field::bool())
                    .field("items", Field::blocks(key_to_path_schema())),
            ),
        )
        .field(
            "config_map",
            Field::block(
                Schema::new()
                    .field("name", Field::string())
                    .field("default_mode", Field::string().validate(validate_mode_bits))
                    .field("optional", Field::bool())
                    .field("items", Field::blocks(key_to_path_schema())),
            ),
        )
        .field(
            "persistent_volume_claim",
            Field::block(Schema::new().field("claim_name", Field::string().required()).field("read_only", Field::bool())),
        )
        .field("host_path", Field::block(Schema::new().field("path", Field::string().required()).field("type", Field::string())))
}

pub fn pod_spec_schema() -> Schema {
    Schema::new()
        .field("active_deadline_seconds", Field::int())
        .field("automount_service_account_token", Field::bool())
        .field("container", Field::blocks(container_schema()).required().min_items(1))
        .field("init_container", Field::blocks(container_schema()))
        .field("dns_policy", Field::string().computed())
        .field("host_ipc", Field::bool())
        .field("host_network", Field::bool())
        .field("host_pid", Field::bool())
        .field("hostname", Field::string())
        .field("node_name", Field::string().computed())
        .field("node_selector", Field::map())
        .field("priority_class_name", Field::string())
        .field("restart_policy", Field::string().computed())
        .field("scheduler_name", Field::string().computed())
        .field(
            "security_context",
            Field::block(
                Schema::new()
                    .field("fs_group", Field::int())
                    .field("run_as_group", Field::int())
                    .field("run_as_non_root", Field::bool())
                    .field("run_as_user", Field::int())
                    .field("se_linux_options", Field::block(se_linux_options_schema()))
                    .field("supplemental_groups", Field::list(FieldType::Int)),
            ),
        )
        .field("service_account_name", Field::string().computed())
        .field("subdomain", Field::string())
        .field("termination_grace_period_seconds", Field::int().computed())
        .field(
            "toleration",
            Field::blocks(
                Schema::new()
                    .field("effect", Field::string())
                    .field("key", Field::string())
                    .field("operator", Field::string())
                    .field("toleration_seconds", Field::int())
                    .field("value", Field::string()),
            ),
        )
        .field("volume", Field::blocks(volume_schema()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfk8s_core::Value;

    #[test]
    fn mode_bits_are_checked_deep_in_pod_specs() {
        let s = Schema::new().field("spec", Field::block(pod_spec_schema()));
        let cfg = Value::from(json!({"spec": [{
            "container": [{"name": "web"}],
            "volume": [{"name": "v", "secret": [{"secret_name": "s", "default_mode": "777"}]}]
        }]}));
        let es = s.validate(&cfg);
        assert!(!es.is_empty());
        assert!(es.iter().all(|e| e.key == "spec.0.volume.0.secret.0.default_mode"), "{es:?}");
    }

    #[test]
    fn containers_are_required() {
        let s = Schema::new().field("spec", Field::block(pod_spec_schema()));
        let es = s.validate(&Value::from(json!({"spec": [{"restart_policy": "Never"}]})));
        assert_eq!(es.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(), vec!["spec.0.container"]);
    }

    #[test]
    fn probe_ports_are_required() {
        let es = container_schema().validate(&Value::from(json!({
            "name": "web",
            "liveness_probe": [{"http_get": [{"path": "/healthz"}]}],
            "readiness_probe": [{"tcp_socket": [{"host": "localhost"}]}]
        })));
        let keys: Vec<_> = es.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["liveness_probe.0.http_get.0.port", "readiness_probe.0.tcp_socket.0.port"]);
    }

    #[test]
    fn cluster_metadata_has_no_namespace() {
        let s = Schema::new().field("metadata", metadata_field(false));
        let es = s.validate(&Value::from(json!({"metadata": [{"name": "x", "namespace": "default"}]})));
        assert_eq!(es.len(), 1);
        assert_eq!(es[0].key, "metadata.0.namespace");
    }
}
