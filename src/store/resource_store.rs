//! Resource store trait definition.
//!
//! This module defines the common interface for resource store backends.

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::model::{
    AccessControlPolicy, Mesh, MeshService, MeshWorkload, ObjectRef, VirtualMesh,
    VirtualMeshStatus,
};

/// Trait for declarative resource store backends.
///
/// Every list call is an independent read: there is no snapshot token shared
/// between calls, so two lists in one cycle may observe different versions of
/// the store.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Lists all meshes.
    async fn list_meshes(&self) -> Result<Vec<Mesh>>;

    /// Lists all mesh services across all meshes.
    async fn list_mesh_services(&self) -> Result<Vec<MeshService>>;

    /// Lists all mesh workloads across all meshes.
    async fn list_mesh_workloads(&self) -> Result<Vec<MeshWorkload>>;

    /// Lists all access-control policies.
    async fn list_access_control_policies(&self) -> Result<Vec<AccessControlPolicy>>;

    /// Lists all virtual meshes, with their last written status.
    async fn list_virtual_meshes(&self) -> Result<Vec<VirtualMesh>>;

    /// Writes the status sub-resource of a virtual mesh.
    async fn update_virtual_mesh_status(
        &self,
        virtual_mesh: &ObjectRef,
        status: &VirtualMeshStatus,
    ) -> Result<()>;

    /// Returns a digest of the stored topology, excluding statuses.
    async fn fingerprint(&self) -> Result<String>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;

    /// Gets one mesh by reference.
    async fn get_mesh(&self, mesh_ref: &ObjectRef) -> Result<Mesh> {
        self.list_meshes()
            .await?
            .into_iter()
            .find(|m| &m.metadata == mesh_ref)
            .ok_or_else(|| {
                StoreError::NotFound {
                    kind: "Mesh",
                    name: mesh_ref.name.clone(),
                    namespace: mesh_ref.namespace.clone(),
                }
                .into()
            })
    }
}
