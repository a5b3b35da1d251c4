//! JSON Patch (RFC 6902) operation model used for update requests.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Json },
    Replace { path: String, value: Json },
    Remove { path: String },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. } | PatchOperation::Replace { path, .. } | PatchOperation::Remove { path } => path,
        }
    }
}

/// Ordered operation sequence. Order is significant: list removals are emitted
/// highest index first so earlier operations never shift later targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchOperations(Vec<PatchOperation>);

impl PatchOperations {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, path: impl Into<String>, value: Json) {
        self.0.push(PatchOperation::Add { path: path.into(), value });
    }

    pub fn replace(&mut self, path: impl Into<String>, value: Json) {
        self.0.push(PatchOperation::Replace { path: path.into(), value });
    }

    pub fn remove(&mut self, path: impl Into<String>) {
        self.0.push(PatchOperation::Remove { path: path.into() });
    }

    pub fn push(&mut self, op: PatchOperation) { self.0.push(op); }

    pub fn extend(&mut self, other: PatchOperations) { self.0.extend(other.0); }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOperation> { self.0.iter() }

    pub fn as_slice(&self) -> &[PatchOperation] { &self.0 }

    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Array(Vec::new()))
    }
}

impl From<Vec<PatchOperation>> for PatchOperations {
    fn from(v: Vec<PatchOperation>) -> Self { Self(v) }
}

impl IntoIterator for PatchOperations {
    type Item = PatchOperation;
    type IntoIter = std::vec::IntoIter<PatchOperation>;
    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'a> IntoIterator for &'a PatchOperations {
    type Item = &'a PatchOperation;
    type IntoIter = std::slice::Iter<'a, PatchOperation>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// Escape one JSON pointer reference token (`~` → `~0`, `/` → `~1`).
pub fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
