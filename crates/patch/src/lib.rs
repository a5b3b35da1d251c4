//! tfk8s patch: minimal JSON Patch operations between two states of a resource.
//!
//! Builders work on serialized (camelCase wire) fragments so paths line up with
//! what the API server stores. Every builder returns an empty sequence for equal
//! inputs.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tfk8s_core::{PatchOperation, PatchOperations};

pub mod list;
pub mod map;
pub mod object;

pub use list::diff_list;
pub use map::diff_string_map;
pub use object::{diff_value, patch_metadata, replace_or_add};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary { pub adds: usize, pub updates: usize, pub removes: usize }

impl DiffSummary {
    pub fn is_empty(&self) -> bool { self.adds + self.updates + self.removes == 0 }
}

/// Count operations by kind.
pub fn summarize(ops: &PatchOperations) -> DiffSummary {
    ops.iter().fold(DiffSummary::default(), |mut s, op| {
        match op {
            PatchOperation::Add { .. } => s.adds += 1,
            PatchOperation::Replace { .. } => s.updates += 1,
            PatchOperation::Remove { .. } => s.removes += 1,
        }
        s
    })
}

/// Structural summary of how `target` differs from `base`, counted per leaf.
pub fn diff_summary(target: &Json, base: &Json) -> DiffSummary {
    fn walk(a: &Json, b: &Json, s: &mut DiffSummary) {
        match (a, b) {
            (Json::Object(ao), Json::Object(bo)) => {
                for (k, av) in ao.iter() {
                    match bo.get(k) {
                        Some(bv) if av == bv => {}
                        Some(bv) => walk(av, bv, s),
                        None => s.adds += 1,
                    }
                }
                s.removes += bo.keys().filter(|k| !ao.contains_key(*k)).count();
            }
            (Json::Array(aa), Json::Array(bb)) => {
                s.updates += aa.iter().zip(bb.iter()).filter(|(x, y)| x != y).count();
                s.adds += aa.len().saturating_sub(bb.len());
                s.removes += bb.len().saturating_sub(aa.len());
            }
            (av, bv) => {
                if av != bv { s.updates += 1; }
            }
        }
    }
    let mut s = DiffSummary::default();
    walk(target, base, &mut s);
    s
}

/// Convert to the `json_patch` model used by kube's `Patch::Json`.
pub fn to_json_patch(ops: &PatchOperations) -> Result<json_patch::Patch, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(ops)?)
}
