//! tfk8s schema: per-kind field schemas and value validators.
//!
//! A [`Schema`] describes the declarative shape of one resource kind. Validation
//! walks a configuration value and reports every problem it finds; it never
//! stops at the first failure and never panics.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tfk8s_core::{Map, Value};

pub mod validators;

pub use validators::{format_mode_bits, parse_mode_bits, validate_base64_encoded, validate_mode_bits, Validator};

/// A validation failure attached to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{key}: {message}")]
pub struct ValidationError {
    pub key: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self { key: key.into(), message: message.into() }
    }
}

#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Bool,
    Int,
    /// Ordered list of scalars.
    List(Box<FieldType>),
    /// String-keyed map of strings.
    Map,
    /// Nested block(s): a list of maps following a sub-schema.
    Block(Schema),
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::List(_) => "list",
            FieldType::Map => "map",
            FieldType::Block(_) => "block list",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub ty: FieldType,
    pub required: bool,
    /// Computed fields are set by the server; configuration may omit them.
    pub computed: bool,
    /// Changing the field cannot be patched; the object must be replaced.
    pub force_new: bool,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub validators: Vec<Validator>,
}

impl Field {
    pub fn new(ty: FieldType) -> Self {
        Self { ty, required: false, computed: false, force_new: false, min_items: None, max_items: None, validators: Vec::new() }
    }

    pub fn string() -> Self { Self::new(FieldType::String) }
    pub fn bool() -> Self { Self::new(FieldType::Bool) }
    pub fn int() -> Self { Self::new(FieldType::Int) }
    pub fn map() -> Self { Self::new(FieldType::Map) }
    pub fn list(elem: FieldType) -> Self { Self::new(FieldType::List(Box::new(elem))) }
    pub fn strings() -> Self { Self::list(FieldType::String) }
    pub fn blocks(schema: Schema) -> Self { Self::new(FieldType::Block(schema)) }

    /// A single nested block (`MaxItems: 1`).
    pub fn block(schema: Schema) -> Self { Self::blocks(schema).max_items(1) }

    pub fn required(mut self) -> Self { self.required = true; self }
    pub fn computed(mut self) -> Self { self.computed = true; self }
    pub fn force_new(mut self) -> Self { self.force_new = true; self }
    pub fn min_items(mut self, n: usize) -> Self { self.min_items = Some(n); self }
    pub fn max_items(mut self, n: usize) -> Self { self.max_items = Some(n); self }
    pub fn validate(mut self, v: Validator) -> Self { self.validators.push(v); self }
}

/// Field name → field definition.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: BTreeMap<&'static str, Field>,
}

impl Schema {
    pub fn new() -> Self { Self::default() }

    pub fn field(mut self, name: &'static str, field: Field) -> Self {
        self.fields.insert(name, field);
        self
    }

    /// Merge another schema's fields into this one (later definitions win).
    pub fn merge(mut self, other: Schema) -> Self {
        self.fields.extend(other.fields);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field> { self.fields.get(name) }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Field)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Validate a top-level configuration value (a map) against this schema.
    pub fn validate(&self, config: &Value) -> Vec<ValidationError> {
        let mut es = Vec::new();
        match config {
            Value::Map(m) => self.validate_map(m, "", &mut es),
            other => es.push(ValidationError::new("", format!("expected map, found {}", other.kind_name()))),
        }
        es
    }

    /// Dotted paths of force-new fields whose value differs between two configurations.
    pub fn replacement_paths(&self, old: &Value, new: &Value) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_replacements(old.as_map(), new.as_map(), "", &mut out);
        out
    }

    /// Mark every field force-new except the named ones.
    pub fn immutable_except(mut self, mutable: &[&str]) -> Self {
        for (name, field) in self.fields.iter_mut() {
            if !mutable.contains(name) {
                field.force_new = true;
            }
        }
        self
    }

    fn collect_replacements(&self, old: Option<&Map>, new: Option<&Map>, path: &str, out: &mut Vec<String>) {
        fn get<'a>(m: Option<&'a Map>, k: &str) -> Option<&'a Value> {
            m.and_then(|m| m.get(k)).filter(|v| !v.is_null())
        }
        for (name, field) in self.fields.iter() {
            let (a, b) = (get(old, *name), get(new, *name));
            let key = join(path, name);
            if field.force_new {
                if a != b { out.push(key); }
                continue;
            }
            if let (FieldType::Block(schema), Some(Value::List(xs)), Some(Value::List(ys))) = (&field.ty, a, b) {
                for (i, (x, y)) in xs.iter().zip(ys.iter()).enumerate() {
                    schema.collect_replacements(x.as_map(), y.as_map(), &join(&key, &i.to_string()), out);
                }
            }
        }
    }

    fn validate_map(&self, map: &Map, path: &str, es: &mut Vec<ValidationError>) {
        for key in map.keys() {
            if !self.fields.contains_key(key.as_str()) {
                es.push(ValidationError::new(join(path, key), "unsupported argument"));
            }
        }
        for (name, field) in self.fields.iter() {
            let key = join(path, name);
            match map.get(*name).filter(|v| !v.is_null()) {
                None => {
                    if field.required && !field.computed {
                        es.push(ValidationError::new(key, "required field is missing"));
                    }
                }
                Some(v) => field.validate_value(v, &key, es),
            }
        }
    }
}

impl Field {
    fn validate_value(&self, v: &Value, key: &str, es: &mut Vec<ValidationError>) {
        match (&self.ty, v) {
            (FieldType::String, Value::String(_)) | (FieldType::Bool, Value::Bool(_)) | (FieldType::Int, Value::Int(_)) => {}
            (FieldType::List(elem), Value::List(items)) => {
                self.check_count(items.len(), key, es);
                for (i, item) in items.iter().enumerate() {
                    check_scalar(elem, item, &join(key, &i.to_string()), es);
                }
            }
            (FieldType::Map, Value::Map(m)) => {
                for (k, item) in m.iter() {
                    check_scalar(&FieldType::String, item, &join(key, k), es);
                }
            }
            (FieldType::Block(schema), Value::List(items)) => {
                self.check_count(items.len(), key, es);
                for (i, item) in items.iter().enumerate() {
                    let p = join(key, &i.to_string());
                    match item {
                        Value::Map(m) => schema.validate_map(m, &p, es),
                        Value::Null => schema.validate_map(&Map::new(), &p, es),
                        other => es.push(ValidationError::new(p, format!("expected map, found {}", other.kind_name()))),
                    }
                }
            }
            (ty, other) => {
                es.push(ValidationError::new(key, format!("expected {}, found {}", ty.name(), other.kind_name())));
                return;
            }
        }
        for validator in self.validators.iter() {
            es.extend(validator(v, key));
        }
    }

    fn check_count(&self, n: usize, key: &str, es: &mut Vec<ValidationError>) {
        if let Some(min) = self.min_items {
            if n < min { es.push(ValidationError::new(key, format!("at least {} item(s) required, found {}", min, n))); }
        }
        if let Some(max) = self.max_items {
            if n > max { es.push(ValidationError::new(key, format!("at most {} item(s) allowed, found {}", max, n))); }
        }
    }
}

fn check_scalar(ty: &FieldType, v: &Value, key: &str, es: &mut Vec<ValidationError>) {
    let ok = matches!((ty, v), (FieldType::String, Value::String(_)) | (FieldType::Bool, Value::Bool(_)) | (FieldType::Int, Value::Int(_)));
    if !ok {
        es.push(ValidationError::new(key, format!("expected {}, found {}", ty.name(), v.kind_name())));
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_string() } else { format!("{}.{}", path, key) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn volume_schema() -> Schema {
        Schema::new()
            .field("name", Field::string().required())
            .field(
                "secret",
                Field::block(Schema::new().field("default_mode", Field::string().validate(validate_mode_bits))),
            )
    }

    #[test]
    fn accepts_well_formed_config() {
        let s = Schema::new().field("volume", Field::blocks(volume_schema()));
        let cfg = Value::from(json!({"volume": [{"name": "v", "secret": [{"default_mode": "0644"}]}]}));
        assert!(s.validate(&cfg).is_empty());
    }

    #[test]
    fn reports_all_problems_with_paths() {
        let s = Schema::new().field("volume", Field::blocks(volume_schema()).min_items(1));
        let cfg = Value::from(json!({
            "volume": [{"secret": [{"default_mode": "777"}, {}], "bogus": true}]
        }));
        let keys: Vec<String> = s.validate(&cfg).into_iter().map(|e| e.key).collect();
        assert!(keys.contains(&"volume.0.bogus".to_string()));
        assert!(keys.contains(&"volume.0.name".to_string()));
        assert!(keys.contains(&"volume.0.secret".to_string()), "max_items violation expected: {keys:?}");
        assert!(keys.contains(&"volume.0.secret.0.default_mode".to_string()));
    }

    #[test]
    fn reports_type_mismatches() {
        let s = Schema::new().field("replicas", Field::int()).field("labels", Field::map()).field("args", Field::strings());
        let cfg = Value::from(json!({"replicas": "3", "labels": {"a": 1}, "args": ["x", 2]}));
        let es = s.validate(&cfg);
        assert_eq!(es.len(), 3, "{es:?}");
        assert!(es.iter().any(|e| e.key == "labels.a"));
        assert!(es.iter().any(|e| e.key == "args.1"));
    }

    #[test]
    fn force_new_changes_are_reported() {
        let s = Schema::new()
            .field("role_ref", Field::block(Schema::new().field("name", Field::string())).force_new())
            .field("spec", Field::block(Schema::new().field("attach_required", Field::bool().force_new()).field("x", Field::int())));
        let old = Value::from(json!({"role_ref": [{"name": "a"}], "spec": [{"attach_required": true, "x": 1}]}));
        let same = Value::from(json!({"role_ref": [{"name": "a"}], "spec": [{"attach_required": true, "x": 2}]}));
        assert!(s.replacement_paths(&old, &same).is_empty());
        let changed = Value::from(json!({"role_ref": [{"name": "b"}], "spec": [{"attach_required": false, "x": 1}]}));
        assert_eq!(s.replacement_paths(&old, &changed), vec!["role_ref".to_string(), "spec.0.attach_required".to_string()]);
    }

    #[test]
    fn immutable_schemas_keep_named_fields_patchable() {
        let s = Schema::new()
            .field("container", Field::blocks(Schema::new().field("image", Field::string()).field("args", Field::strings()).immutable_except(&["image"])))
            .field("deadline", Field::int())
            .field("hostname", Field::string())
            .immutable_except(&["container", "deadline"]);
        let old = Value::from(json!({"container": [{"image": "a", "args": ["x"]}], "deadline": 1, "hostname": "h"}));
        let patchable = Value::from(json!({"container": [{"image": "b", "args": ["x"]}], "deadline": 2, "hostname": "h"}));
        assert!(s.replacement_paths(&old, &patchable).is_empty());
        let changed = Value::from(json!({"container": [{"image": "a", "args": ["y"]}], "deadline": 1, "hostname": "g"}));
        assert_eq!(s.replacement_paths(&old, &changed), vec!["container.0.args".to_string(), "hostname".to_string()]);
    }

    #[test]
    fn computed_required_fields_may_be_omitted() {
        let s = Schema::new().field("uid", Field::string().required().computed());
        assert!(s.validate(&Value::Map(Map::new())).is_empty());
    }
}
