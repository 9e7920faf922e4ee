//! Control-plane data model.
//!
//! This module defines the declarative objects the enforcer reads from the
//! resource store:
//! - Meshes and their provider-specific configuration
//! - Mesh services and mesh workloads discovered in the clusters
//! - Access-control policies and the virtual meshes that group them

mod mesh;
mod policy;
mod topology;

pub use mesh::{AppMeshSpec, Mesh, MeshType, ObjectRef};
pub use policy::{
    AccessControlPolicy, EnforcementPolicy, EnforcementStatus, LabelMatcher, ServiceSelector,
    StatusState, VirtualMesh, VirtualMeshStatus, WorkloadSelector,
};
pub use topology::{
    ContainerPort, KubeControllerRef, KubeServiceRef, MeshService, MeshWorkload, ServicePort,
};
