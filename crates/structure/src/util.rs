//! Small conversions shared by the field-group mappers.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString};
use tfk8s_core::{FieldPath, Fields, Map, Value, ValueError};
use tfk8s_schema::{format_mode_bits, parse_mode_bits};

pub(crate) fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() { None } else { Some(v) }
}

pub(crate) fn non_empty_map<V>(m: BTreeMap<String, V>) -> Option<BTreeMap<String, V>> {
    if m.is_empty() { None } else { Some(m) }
}

/// Insert `value` unless it is absent or the empty string.
pub(crate) fn put_str(m: &mut Map, key: &str, value: Option<&String>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        m.insert(key.to_string(), Value::String(v.clone()));
    }
}

pub(crate) fn put<T: Into<Value>>(m: &mut Map, key: &str, value: Option<T>) {
    if let Some(v) = value {
        m.insert(key.to_string(), v.into());
    }
}

/// Insert a list unless it is absent or empty.
pub(crate) fn put_list(m: &mut Map, key: &str, value: Option<Vec<Value>>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        m.insert(key.to_string(), Value::List(v));
    }
}

pub(crate) fn strings(v: &[String]) -> Value {
    Value::List(string_values(v))
}

pub(crate) fn string_values(v: &[String]) -> Vec<Value> {
    v.iter().cloned().map(Value::String).collect()
}

pub(crate) fn string_map(m: &BTreeMap<String, String>) -> Value {
    Value::from(m.clone())
}

/// Numeric strings become `Int`, anything else stays a named port.
pub(crate) fn int_or_string(s: &str) -> IntOrString {
    match s.parse::<i32>() {
        Ok(i) => IntOrString::Int(i),
        Err(_) => IntOrString::String(s.to_string()),
    }
}

pub(crate) fn int_or_string_value(v: &IntOrString) -> Value {
    match v {
        IntOrString::Int(i) => Value::String(i.to_string()),
        IntOrString::String(s) => Value::String(s.clone()),
    }
}

pub(crate) fn quantities(m: BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    non_empty_map(m.into_iter().map(|(k, v)| (k, Quantity(v))).collect())
}

pub(crate) fn quantities_value(m: &BTreeMap<String, Quantity>) -> Value {
    Value::Map(m.iter().map(|(k, q)| (k.clone(), Value::String(q.0.clone()))).collect())
}

/// Read an octal mode string (`"0644"`) into its numeric value.
pub(crate) fn mode_bits(f: &Fields<'_>, key: &str) -> Result<Option<i32>, ValueError> {
    match f.str(key)? {
        None | Some("") => Ok(None),
        Some(s) => parse_mode_bits(s).map(Some).ok_or_else(|| ValueError::Invalid {
            path: f.key_path(key),
            value: s.to_string(),
            reason: "expected octal mode bits between 0 and 0777".to_string(),
        }),
    }
}

pub(crate) fn mode_bits_value(mode: i32) -> Value {
    Value::String(format_mode_bits(mode))
}

pub(crate) fn i64_list(v: &[i64]) -> Value {
    Value::List(v.iter().copied().map(Value::Int).collect())
}

/// Expand the first element of a single-block list, if present.
pub(crate) fn block_with<T>(
    f: &Fields<'_>,
    key: &str,
    expand: impl FnOnce(&Fields<'_>) -> Result<T, ValueError>,
) -> Result<Option<T>, ValueError> {
    f.block(key)?.map(|b| expand(&b)).transpose()
}

/// Expand a block list; an empty list reads as absent.
pub(crate) fn list_with<T>(
    f: &Fields<'_>,
    key: &str,
    expand: impl FnOnce(&[Value], &FieldPath) -> Result<Vec<T>, ValueError>,
) -> Result<Option<Vec<T>>, ValueError> {
    Ok(non_empty(expand(f.list(key)?, &f.path().join(key))?))
}
