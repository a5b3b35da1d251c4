//! tfk8s structure: expand configuration values into Kubernetes API objects and
//! flatten API objects back into configuration values.
//!
//! Every field group has an `expand_*` / `flatten_*` pair. Expanders read a
//! [`tfk8s_core::Fields`] view (or a block list plus its path) and fail with a
//! [`tfk8s_core::ValueError`] naming the offending field; flatteners are total.
//! Single nested blocks are one-element lists of maps on the configuration side.

#![forbid(unsafe_code)]

mod util;

pub mod container;
pub mod csi;
pub mod deployment;
pub mod endpoints;
pub mod metadata;
pub mod network_policy;
pub mod pod;
pub mod pvc;
pub mod rbac;
pub mod selector;
pub mod volume;

pub use metadata::{build_id, expand_metadata, flatten_metadata, is_internal_key};
