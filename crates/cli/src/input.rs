//! Document loading: JSON or YAML files, bounded in size.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as Json;
use tfk8s_core::Value;

/// Parse a JSON or YAML document. YAML is a superset, so one parser covers both.
pub fn parse_doc(text: &str, max_bytes: usize) -> Result<Json> {
    if text.len() > max_bytes {
        bail!("document too large ({} bytes, limit {})", text.len(), max_bytes);
    }
    let doc: Json = serde_yaml::from_str(text).context("parsing document")?;
    if !doc.is_object() {
        bail!("expected a mapping at the document root");
    }
    Ok(doc)
}

pub fn load_doc(path: &Path, max_bytes: usize) -> Result<Json> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_doc(&text, max_bytes).with_context(|| format!("in {}", path.display()))
}

pub fn load_config(path: &Path, max_bytes: usize) -> Result<Value> { Ok(Value::from(load_doc(path, max_bytes)?)) }

/// Optional prior configuration; missing means empty.
pub fn load_prior(path: Option<&Path>, max_bytes: usize) -> Result<Value> {
    match path {
        Some(p) => load_config(p, max_bytes),
        None => Ok(Value::Null),
    }
}
