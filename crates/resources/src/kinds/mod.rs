//! Built-in resource kinds.

mod csi_driver;
mod deployment;
mod endpoints;
mod network_policy;
mod pod;
mod pvc;
mod role_binding;

pub use csi_driver::CsiDriver;
pub use deployment::Deployment;
pub use endpoints::Endpoints;
pub use network_policy::NetworkPolicy;
pub use pod::Pod;
pub use pvc::PersistentVolumeClaim;
pub use role_binding::RoleBinding;
