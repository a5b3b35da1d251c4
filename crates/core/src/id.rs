//! Resource identifiers: `<namespace>/<name>` for namespaced objects, `<name>` otherwise.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("unexpected ID format ({0:?}), expected namespace/name or name")]
    Format(String),
    #[error("unexpected ID format ({0:?}), expected namespace/name")]
    MissingNamespace(String),
}

impl ResourceId {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: Some(namespace.into()), name: name.into() }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self { namespace: None, name: name.into() }
    }

    /// Parse an ID that must carry a namespace.
    pub fn parse_namespaced(s: &str) -> Result<Self, IdError> {
        let id: ResourceId = s.parse()?;
        if id.namespace.is_none() {
            return Err(IdError::MissingNamespace(s.to_string()));
        }
        Ok(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ResourceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(ResourceId::cluster(*name)),
            [ns, name] if !ns.is_empty() && !name.is_empty() => Ok(ResourceId::namespaced(*ns, *name)),
            _ => Err(IdError::Format(s.to_string())),
        }
    }
}
