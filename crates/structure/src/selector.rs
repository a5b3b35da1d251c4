//! Label selectors (`selector`, `pod_selector`, `namespace_selector` blocks).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use tfk8s_core::{blocks_of, FieldPath, Fields, Map, Value, ValueError};

use crate::util::{non_empty, non_empty_map, string_map, strings};

pub fn expand_label_selector(f: &Fields<'_>) -> Result<LabelSelector, ValueError> {
    Ok(LabelSelector {
        match_labels: non_empty_map(f.string_map("match_labels")?),
        match_expressions: non_empty(expand_label_selector_requirements(
            f.list("match_expressions")?,
            &f.path().join("match_expressions"),
        )?),
    })
}

pub fn expand_label_selector_requirements(items: &[Value], path: &FieldPath) -> Result<Vec<LabelSelectorRequirement>, ValueError> {
    blocks_of(items, path)?
        .iter()
        .map(|f| {
            Ok(LabelSelectorRequirement {
                key: f.str("key")?.unwrap_or_default().to_string(),
                operator: f.str("operator")?.unwrap_or_default().to_string(),
                values: non_empty(f.string_list("values")?),
            })
        })
        .collect()
}

pub fn flatten_label_selector(sel: &LabelSelector) -> Value {
    let mut m = Map::new();
    if let Some(l) = sel.match_labels.as_ref().filter(|l| !l.is_empty()) {
        m.insert("match_labels".into(), string_map(l));
    }
    if let Some(e) = sel.match_expressions.as_ref().filter(|e| !e.is_empty()) {
        m.insert("match_expressions".into(), flatten_label_selector_requirements(e));
    }
    Value::block(m)
}

pub fn flatten_label_selector_requirements(reqs: &[LabelSelectorRequirement]) -> Value {
    Value::List(
        reqs.iter()
            .map(|r| {
                let mut m = Map::new();
                m.insert("key".into(), Value::from(r.key.as_str()));
                m.insert("operator".into(), Value::from(r.operator.as_str()));
                if let Some(v) = r.values.as_ref().filter(|v| !v.is_empty()) {
                    m.insert("values".into(), strings(v));
                }
                Value::Map(m)
            })
            .collect(),
    )
}
