//! tfk8s core types: declarative values, resource identifiers and patch operations.

#![forbid(unsafe_code)]

pub mod id;
pub mod patch;
pub mod value;

pub use id::{IdError, ResourceId};
pub use patch::{escape_pointer, PatchOperation, PatchOperations};
pub use value::{blocks_of, FieldPath, Fields, Map, Value, ValueError};

pub mod prelude {
    pub use super::{blocks_of, FieldPath, Fields, Map, PatchOperation, PatchOperations, ResourceId, Value, ValueError};
}
