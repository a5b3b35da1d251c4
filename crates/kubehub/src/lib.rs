//! tfk8s kubehub: the session handle (configuration plus kube client) and
//! generic create/read/update/delete of mapped objects.

#![forbid(unsafe_code)]

use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use kube::{
    api::{Api, DeleteParams, Patch, PatchParams, PostParams},
    core::{DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    Client,
};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tfk8s_core::{ResourceId, Value};
use tfk8s_patch::{summarize, to_json_patch};
use tfk8s_resources::{MappingError, RawObject, ResourceKind};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Namespace for objects that do not name one.
    pub default_namespace: String,
    pub field_manager: String,
    /// Ask the server to validate requests without persisting them.
    pub dry_run: bool,
    pub max_doc_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { default_namespace: "default".into(), field_manager: "tfk8s".into(), dry_run: false, max_doc_bytes: 1 << 20 }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            default_namespace: get("TFK8S_DEFAULT_NAMESPACE").filter(|s| !s.is_empty()).unwrap_or(d.default_namespace),
            field_manager: get("TFK8S_FIELD_MANAGER").filter(|s| !s.is_empty()).unwrap_or(d.field_manager),
            dry_run: get("TFK8S_DRY_RUN").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(d.dry_run),
            max_doc_bytes: get("TFK8S_MAX_DOC_BYTES").and_then(|s| s.parse::<usize>().ok()).unwrap_or(d.max_doc_bytes),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams { dry_run: self.dry_run, field_manager: Some(self.field_manager.clone()) }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams { dry_run: self.dry_run, field_manager: Some(self.field_manager.clone()), ..Default::default() }
    }
}

/// Explicitly constructed provider session, passed by reference to every operation.
#[derive(Clone)]
pub struct Session {
    config: SessionConfig,
    client: Client,
}

impl Session {
    pub fn new(config: SessionConfig, client: Client) -> Self { Self { config, client } }

    /// Build a session with kube's default client inference (kubeconfig or in-cluster).
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let client = Client::try_default().await.context("building kube client")?;
        Ok(Self::new(config, client))
    }

    pub fn config(&self) -> &SessionConfig { &self.config }

    pub fn client(&self) -> Client { self.client.clone() }

    fn api(&self, kind: &dyn ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = kind.api_resource();
        if kind.namespaced() {
            let ns = namespace.unwrap_or(&self.config.default_namespace);
            Api::namespaced_with(self.client.clone(), ns, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        }
    }

    pub async fn create(&self, kind: &dyn ResourceKind, config: &Value) -> Result<(ResourceId, Value)> {
        check(kind, config)?;
        let wire = kind.expand(config)?;
        let obj: DynamicObject = serde_json::from_value(wire).context("building request object")?;
        let api = self.api(kind, obj.metadata.namespace.as_deref());
        info!(kind = kind.name(), name = ?obj.metadata.name, dry_run = self.config.dry_run, "creating");
        let t0 = Instant::now();
        let res = api.create(&self.config.post_params(), &obj).await;
        observe("create", t0, &res);
        let out = res.with_context(|| format!("creating {}", kind.name()))?;
        let out = serde_json::to_value(&out)?;
        let id = kind.id_of(&out)?;
        info!(kind = kind.name(), id = %id, "created");
        let state = kind.flatten(&out, config)?;
        debug!(kind = kind.name(), ?state, "flattened");
        Ok((id, state))
    }

    /// Current state, or `None` when the object no longer exists.
    pub async fn read(&self, kind: &dyn ResourceKind, id: &ResourceId, prior: &Value) -> Result<Option<Value>> {
        let api = self.api(kind, id.namespace.as_deref());
        info!(kind = kind.name(), id = %id, "reading");
        let t0 = Instant::now();
        let res = api.get_opt(&id.name).await;
        observe("read", t0, &res);
        let Some(obj) = res.with_context(|| format!("reading {} {}", kind.name(), id))? else {
            warn!(kind = kind.name(), id = %id, "object not found");
            return Ok(None);
        };
        let state = kind.flatten(&serde_json::to_value(&obj)?, prior)?;
        debug!(kind = kind.name(), ?state, "flattened");
        Ok(Some(state))
    }

    /// Patch the live object from `old` to `new`. Nothing is sent when the patch is empty.
    pub async fn update(&self, kind: &dyn ResourceKind, id: &ResourceId, old: &Value, new: &Value) -> Result<Value> {
        check(kind, new)?;
        let replace = kind.requires_replacement(old, new);
        if !replace.is_empty() {
            bail!("{} {}: changing {} requires replacing the object", kind.name(), id, replace.join(", "));
        }
        let ops = kind.patch(old, new)?;
        if ops.is_empty() {
            info!(kind = kind.name(), id = %id, "no changes to submit");
            return self.read(kind, id, new).await?.ok_or_else(|| anyhow!("{} {} not found", kind.name(), id));
        }
        let summary = summarize(&ops);
        counter!("session_patch_ops", ops.len() as u64);
        info!(kind = kind.name(), id = %id, ops = %ops.to_json(), adds = summary.adds, updates = summary.updates, removes = summary.removes, "updating");
        let patch = to_json_patch(&ops).context("encoding patch")?;
        let api = self.api(kind, id.namespace.as_deref());
        let t0 = Instant::now();
        let res = api.patch(&id.name, &self.config.patch_params(), &Patch::Json::<()>(patch)).await;
        observe("update", t0, &res);
        let out = res.with_context(|| format!("updating {} {}", kind.name(), id))?;
        let state = kind.flatten(&serde_json::to_value(&out)?, new)?;
        debug!(kind = kind.name(), ?state, "flattened");
        Ok(state)
    }

    pub async fn delete(&self, kind: &dyn ResourceKind, id: &ResourceId) -> Result<()> {
        let api = self.api(kind, id.namespace.as_deref());
        info!(kind = kind.name(), id = %id, "deleting");
        let dp = DeleteParams { dry_run: self.config.dry_run, ..Default::default() };
        let t0 = Instant::now();
        let res = api.delete(&id.name, &dp).await;
        observe("delete", t0, &res);
        res.with_context(|| format!("deleting {} {}", kind.name(), id))?;
        info!(kind = kind.name(), id = %id, "deleted");
        Ok(())
    }

    pub fn parse_raw(&self, object_json: &str) -> Result<RawObject> {
        if object_json.len() > self.config.max_doc_bytes {
            bail!("object document too large (>{} bytes)", self.config.max_doc_bytes);
        }
        Ok(RawObject::parse(object_json, &self.config.default_namespace)?)
    }

    pub async fn create_raw(&self, obj: &RawObject) -> Result<ResourceId> {
        let api = self.raw_api(obj).await?;
        let body: DynamicObject = serde_json::from_value(obj.object.clone()).context("building request object")?;
        info!(gvk = %gvk_key(&obj.gvk()), id = %obj.id(), "creating raw object");
        let t0 = Instant::now();
        let res = api.create(&self.config.post_params(), &body).await;
        observe("create_raw", t0, &res);
        res.context("unable to create kubernetes resource")?;
        Ok(obj.id())
    }

    pub async fn replace_raw(&self, obj: &RawObject) -> Result<ResourceId> {
        let api = self.raw_api(obj).await?;
        let body: DynamicObject = serde_json::from_value(obj.object.clone()).context("building request object")?;
        info!(gvk = %gvk_key(&obj.gvk()), id = %obj.id(), "replacing raw object");
        let t0 = Instant::now();
        let res = api.replace(&obj.name, &self.config.post_params(), &body).await;
        observe("replace_raw", t0, &res);
        res.context("unable to update kubernetes resource")?;
        Ok(obj.id())
    }

    /// Delete with foreground propagation so dependents go first.
    pub async fn delete_raw(&self, obj: &RawObject) -> Result<()> {
        let api = self.raw_api(obj).await?;
        let mut dp = DeleteParams::foreground();
        dp.dry_run = self.config.dry_run;
        info!(gvk = %gvk_key(&obj.gvk()), id = %obj.id(), "deleting raw object");
        let t0 = Instant::now();
        let res = api.delete(&obj.name, &dp).await;
        observe("delete_raw", t0, &res);
        res.context("unable to delete kubernetes resource")?;
        Ok(())
    }

    async fn raw_api(&self, obj: &RawObject) -> Result<Api<DynamicObject>> {
        let (ar, namespaced) = find_api_resource(self.client.clone(), &obj.gvk()).await?;
        Ok(if namespaced {
            Api::namespaced_with(self.client.clone(), &obj.namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        })
    }
}

fn check(kind: &dyn ResourceKind, config: &Value) -> Result<()> {
    let errors = kind.validate(config);
    if errors.is_empty() {
        return Ok(());
    }
    counter!("session_invalid_configs", 1u64);
    Err(MappingError::Invalid(errors).into())
}

fn observe<T, E>(op: &'static str, t0: Instant, res: &std::result::Result<T, E>) {
    counter!("session_requests", 1u64, "op" => op);
    if res.is_err() {
        counter!("session_errors", 1u64, "op" => op);
    }
    histogram!("session_latency_ms", t0.elapsed().as_secs_f64() * 1000.0, "op" => op);
}

fn gvk_key(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{}/{}", gvk.version, gvk.kind)
    } else {
        format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
    }
}

async fn find_api_resource(client: Client, gvk: &GroupVersionKind) -> Result<(kube::core::ApiResource, bool)> {
    let discovery = Discovery::new(client).run().await?;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar.clone(), namespaced));
            }
        }
    }
    Err(anyhow!("GVK not found: {}", gvk_key(gvk)))
}

/// Wire form of a configuration expanded for `kind`, for offline inspection.
pub fn preview(kind: &dyn ResourceKind, config: &Value) -> Result<Json> {
    check(kind, config)?;
    Ok(kind.expand(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults() {
        let c = SessionConfig::from_lookup(|_| None);
        assert_eq!(c, SessionConfig::default());
        assert_eq!(c.default_namespace, "default");
        assert_eq!(c.field_manager, "tfk8s");
        assert!(!c.dry_run);
    }

    #[test]
    fn config_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TFK8S_DEFAULT_NAMESPACE", "apps"),
            ("TFK8S_FIELD_MANAGER", "ci"),
            ("TFK8S_DRY_RUN", "TRUE"),
            ("TFK8S_MAX_DOC_BYTES", "not-a-number"),
        ]);
        let c = SessionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.default_namespace, "apps");
        assert_eq!(c.field_manager, "ci");
        assert!(c.dry_run);
        assert_eq!(c.max_doc_bytes, 1 << 20);
        assert!(c.patch_params().dry_run);
        assert_eq!(c.post_params().field_manager.as_deref(), Some("ci"));
    }

    #[test]
    fn gvk_keys() {
        let core = GroupVersionKind { group: String::new(), version: "v1".into(), kind: "ConfigMap".into() };
        assert_eq!(gvk_key(&core), "v1/ConfigMap");
        let apps = GroupVersionKind { group: "apps".into(), version: "v1".into(), kind: "Deployment".into() };
        assert_eq!(gvk_key(&apps), "apps/v1/Deployment");
    }

    #[test]
    fn preview_rejects_invalid_configs() {
        let registry = tfk8s_resources::Registry::builtin();
        let kind = registry.get("kubernetes_csi_driver").unwrap();
        let bad = Value::from(serde_json::json!({"metadata": [{"name": "x"}]}));
        let err = preview(kind, &bad).unwrap_err().to_string();
        assert!(err.contains("spec: required field is missing"), "{err}");
        let good = Value::from(serde_json::json!({"metadata": [{"name": "x"}], "spec": [{"attach_required": false}]}));
        assert_eq!(preview(kind, &good).unwrap()["spec"]["attachRequired"], false);
    }
}
