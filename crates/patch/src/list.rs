//! Ordered list diff.

use serde_json::Value as Json;
use tfk8s_core::PatchOperations;

/// Diff two lists into `replace`/`remove`/`add` operations under `path`.
///
/// Elements are aligned on their longest common subsequence. Unaligned runs
/// between two anchors pair off as in-place replaces; leftovers on the old side
/// are removed from the highest index down, leftovers on the new side are added
/// at their final index from the lowest up.
pub fn diff_list(path: &str, old: &[Json], new: &[Json]) -> PatchOperations {
    let mut ops = PatchOperations::new();
    if old == new {
        return ops;
    }
    if old.is_empty() {
        ops.add(path, Json::Array(new.to_vec()));
        return ops;
    }
    if new.is_empty() {
        ops.remove(path);
        return ops;
    }

    let mut replaces = Vec::new();
    let mut removes = Vec::new();
    let mut adds = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    for (ai, aj) in lcs(old, new).into_iter().chain(std::iter::once((old.len(), new.len()))) {
        let paired = (ai - i).min(aj - j);
        replaces.extend((0..paired).map(|k| (i + k, j + k)));
        removes.extend(i + paired..ai);
        adds.extend(j + paired..aj);
        i = ai + 1;
        j = aj + 1;
    }

    for (oi, nj) in replaces {
        ops.replace(format!("{}/{}", path, oi), new[nj].clone());
    }
    for oi in removes.into_iter().rev() {
        ops.remove(format!("{}/{}", path, oi));
    }
    for nj in adds {
        ops.add(format!("{}/{}", path, nj), new[nj].clone());
    }
    ops
}

/// Index pairs of one longest common subsequence, ascending.
fn lcs(a: &[Json], b: &[Json]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    // table[i][j] = LCS length of a[i..] and b[j..]
    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] { table[i + 1][j + 1] + 1 } else { table[i + 1][j].max(table[i][j + 1]) };
        }
    }
    let mut pairs = Vec::with_capacity(table[0][0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(v: Json) -> Vec<Json> { v.as_array().cloned().unwrap_or_default() }

    fn apply(old: &[Json], ops: &PatchOperations) -> Json {
        let mut doc = json!({"items": old});
        let patch: json_patch::Patch = serde_json::from_value(ops.to_json()).unwrap();
        json_patch::patch(&mut doc, &patch.0).unwrap();
        doc["items"].clone()
    }

    #[test]
    fn identical_lists_emit_nothing() {
        let a = list(json!([{"name": "a"}, {"name": "b"}]));
        assert!(diff_list("/subjects", &a, &a).is_empty());
        assert!(diff_list("/subjects", &[], &[]).is_empty());
    }

    #[test]
    fn shift_emits_remove_then_add() {
        let old = list(json!(["A", "B"]));
        let new = list(json!(["B", "C"]));
        let ops = diff_list("/subjects", &old, &new);
        assert_eq!(
            ops.to_json(),
            json!([{"op": "remove", "path": "/subjects/0"}, {"op": "add", "path": "/subjects/1", "value": "C"}])
        );
    }

    #[test]
    fn whole_list_on_empty_sides() {
        let new = list(json!(["A"]));
        assert_eq!(diff_list("/subjects", &[], &new).to_json(), json!([{"op": "add", "path": "/subjects", "value": ["A"]}]));
        assert_eq!(diff_list("/subjects", &new, &[]).to_json(), json!([{"op": "remove", "path": "/subjects"}]));
    }

    #[test]
    fn changed_element_is_replaced_in_place() {
        let old = list(json!(["A", "B", "C"]));
        let new = list(json!(["A", "X", "C"]));
        assert_eq!(diff_list("/l", &old, &new).to_json(), json!([{"op": "replace", "path": "/l/1", "value": "X"}]));
    }

    #[test]
    fn removals_are_descending() {
        let old = list(json!(["A", "B", "C", "D"]));
        let new = list(json!(["B", "D"]));
        let ops = diff_list("/l", &old, &new);
        let paths: Vec<&str> = ops.iter().map(|o| o.path()).collect();
        assert_eq!(paths, vec!["/l/2", "/l/0"]);
    }

    #[test]
    fn applying_the_diff_yields_the_new_list() {
        let cases = [
            (json!(["A", "B"]), json!(["B", "C"])),
            (json!(["A", "B", "C"]), json!(["C", "B", "A"])),
            (json!(["A"]), json!(["X", "A", "Y", "Z"])),
            (json!(["A", "B", "C", "D", "E"]), json!(["B", "X", "D"])),
            (json!([{"k": 1}, {"k": 2}]), json!([{"k": 2}, {"k": 3}, {"k": 1}])),
        ];
        for (old, new) in cases {
            let (old, new) = (list(old), list(new));
            let ops = diff_list("/items", &old, &new);
            assert_eq!(apply(&old, &ops), Json::Array(new.clone()), "{old:?} -> {new:?}: {ops:?}");
        }
    }
}
