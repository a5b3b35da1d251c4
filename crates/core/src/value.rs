//! Declarative values: the untyped configuration tree handed to expanders and
//! produced by flatteners.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// String-keyed mapping. Ordered so flattened output is deterministic.
pub type Map = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Map),
}

/// Shape errors raised when a value does not have the structure a mapper expects.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("{path}: expected {expected}, found {found}")]
    Shape { path: String, expected: &'static str, found: &'static str },
    #[error("{path}: value {value} out of range for {target}")]
    OutOfRange { path: String, value: i64, target: &'static str },
    #[error("{path}: invalid value {value:?}: {reason}")]
    Invalid { path: String, value: String, reason: String },
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    /// Wrap a map as a single nested block (a one-element list of maps).
    pub fn block(map: Map) -> Value { Value::List(vec![Value::Map(map)]) }

    pub fn as_str(&self) -> Option<&str> {
        match self { Value::String(s) => Some(s), _ => None }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self { Value::List(l) => Some(l), _ => None }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self { Value::Map(m) => Some(m), _ => None }
    }

    /// Walk a Terraform-style dotted path (`metadata.0.labels`).
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for seg in path.split('.').filter(|s| !s.is_empty()) {
            cur = match cur {
                Value::Map(m) => m.get(seg)?,
                Value::List(l) => l.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn expect_str(&self, path: &str) -> Result<&str, ValueError> {
        self.as_str().ok_or_else(|| shape(path, "string", self))
    }

    pub fn expect_list(&self, path: &str) -> Result<&[Value], ValueError> {
        self.as_list().ok_or_else(|| shape(path, "list", self))
    }

    pub fn expect_map(&self, path: &str) -> Result<&Map, ValueError> {
        self.as_map().ok_or_else(|| shape(path, "map", self))
    }

    pub fn expect_bool(&self, path: &str) -> Result<bool, ValueError> {
        match self { Value::Bool(b) => Ok(*b), other => Err(shape(path, "bool", other)) }
    }

    pub fn expect_int(&self, path: &str) -> Result<i64, ValueError> {
        match self {
            Value::Int(i) => Ok(*i),
            // Integral floats show up when values pass through YAML or JS tooling
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(*f as i64),
            other => Err(shape(path, "int", other)),
        }
    }
}

fn shape(path: &str, expected: &'static str, found: &Value) -> ValueError {
    ValueError::Shape { path: path.to_string(), expected, found: found.kind_name() }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::String(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::String(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(v as i64) }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self { Value::List(v) }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self { Value::Map(v) }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(v: BTreeMap<String, String>) -> Self {
        Value::Map(v.into_iter().map(|(k, s)| (k, Value::String(s))).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self { Value::List(v.into_iter().map(Value::String).collect()) }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            J::String(s) => Value::String(s),
            J::Array(a) => Value::List(a.into_iter().map(Value::from).collect()),
            J::Object(o) => Value::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        use serde_json::Value as J;
        match v {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
            Value::String(s) => J::String(s.clone()),
            Value::List(l) => J::Array(l.iter().map(J::from).collect()),
            Value::Map(m) => J::Object(m.iter().map(|(k, v)| (k.clone(), J::from(v))).collect()),
        }
    }
}

/// Dotted configuration path (`spec.0.volume.1`) used in error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self { FieldPath(String::new()) }

    pub fn join(&self, key: &str) -> FieldPath {
        if self.0.is_empty() { FieldPath(key.to_string()) } else { FieldPath(format!("{}.{}", self.0, key)) }
    }

    pub fn index(&self, i: usize) -> FieldPath { self.join(&i.to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for FieldPath {
    fn from(v: &str) -> Self { FieldPath(v.to_string()) }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.0) }
}

/// Typed view over one configuration map, carrying its dotted path for error messages.
///
/// Missing keys and explicit nulls read as `None`; a present key with the wrong
/// shape is a `ValueError`.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    map: &'a Map,
    path: FieldPath,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a Map, path: FieldPath) -> Self { Self { map, path } }

    pub fn root(map: &'a Map) -> Self { Self::new(map, FieldPath::root()) }

    /// View a value that must be a map; null reads as an empty map.
    pub fn of(v: &'a Value, path: FieldPath) -> Result<Self, ValueError> {
        match v {
            Value::Null => Ok(Self::new(empty_map(), path)),
            other => other.expect_map(path.as_str()).map(|m| Self::new(m, path.clone())),
        }
    }

    pub fn path(&self) -> &FieldPath { &self.path }

    pub fn map(&self) -> &'a Map { self.map }

    pub fn key_path(&self, key: &str) -> String { self.path.join(key).0 }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn contains(&self, key: &str) -> bool { self.get(key).is_some() }

    pub fn str(&self, key: &str) -> Result<Option<&'a str>, ValueError> {
        self.get(key).map(|v| v.expect_str(&self.key_path(key))).transpose()
    }

    /// Non-empty string; the empty string reads as absent.
    pub fn string(&self, key: &str) -> Result<Option<String>, ValueError> {
        Ok(self.str(key)?.filter(|s| !s.is_empty()).map(str::to_string))
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, ValueError> {
        self.get(key).map(|v| v.expect_bool(&self.key_path(key))).transpose()
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, ValueError> {
        self.get(key).map(|v| v.expect_int(&self.key_path(key))).transpose()
    }

    pub fn i32(&self, key: &str) -> Result<Option<i32>, ValueError> {
        match self.int(key)? {
            None => Ok(None),
            Some(v) => i32::try_from(v)
                .map(Some)
                .map_err(|_| ValueError::OutOfRange { path: self.key_path(key), value: v, target: "i32" }),
        }
    }

    pub fn list(&self, key: &str) -> Result<&'a [Value], ValueError> {
        match self.get(key) {
            None => Ok(&[]),
            Some(v) => v.expect_list(&self.key_path(key)),
        }
    }

    /// List of strings; absent reads as empty.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, ValueError> {
        let path = self.path.join(key);
        self.list(key)?
            .iter()
            .enumerate()
            .map(|(i, v)| v.expect_str(path.index(i).as_str()).map(str::to_string))
            .collect()
    }

    /// List of integers; absent reads as empty.
    pub fn int_list(&self, key: &str) -> Result<Vec<i64>, ValueError> {
        let path = self.path.join(key);
        self.list(key)?.iter().enumerate().map(|(i, v)| v.expect_int(path.index(i).as_str())).collect()
    }

    /// String-to-string map (labels, annotations, quantities).
    pub fn string_map(&self, key: &str) -> Result<BTreeMap<String, String>, ValueError> {
        let path = self.path.join(key);
        let Some(v) = self.get(key) else { return Ok(BTreeMap::new()) };
        v.expect_map(path.as_str())?
            .iter()
            .map(|(k, v)| v.expect_str(path.join(k).as_str()).map(|s| (k.clone(), s.to_string())))
            .collect()
    }

    /// Every map of a block list.
    pub fn blocks(&self, key: &str) -> Result<Vec<Fields<'a>>, ValueError> {
        blocks_of(self.list(key)?, &self.path.join(key))
    }

    /// First element of a single-block list (`MaxItems: 1`), if any.
    pub fn block(&self, key: &str) -> Result<Option<Fields<'a>>, ValueError> {
        Ok(self.blocks(key)?.into_iter().next())
    }
}

/// View each element of a block list as a map.
pub fn blocks_of<'a>(items: &'a [Value], path: &FieldPath) -> Result<Vec<Fields<'a>>, ValueError> {
    items.iter().enumerate().map(|(i, v)| Fields::of(v, path.index(i))).collect()
}

fn empty_map() -> &'static Map {
    static EMPTY: Map = Map::new();
    &EMPTY
}
