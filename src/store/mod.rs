//! Declarative resource store module.
//!
//! This module provides read access to meshes, mesh services, mesh workloads,
//! access-control policies and virtual meshes, and write access to the status
//! of virtual meshes. Backends keep the topology as a YAML manifest and the
//! statuses as a JSON document next to it.

mod resource_store;
mod manifest;
mod local;
mod s3;

pub use resource_store::ResourceStore;
pub use manifest::{Manifest, StatusFile};
pub use local::LocalResourceStore;
pub use s3::S3ResourceStore;
