//! Per-provider enforcer contract.

use async_trait::async_trait;

use crate::error::{ReconcileError, Result};
use crate::model::{Mesh, MeshType};

/// Enforces or relaxes access control for the meshes of one provider.
///
/// The orchestrator hands every enforcer the full mesh list; an enforcer
/// skips the meshes for which [`MeshEnforcer::applies`] is false.
#[async_trait]
pub trait MeshEnforcer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Returns true if this enforcer owns the mesh's provider.
    fn applies(&self, mesh: &Mesh) -> bool;

    /// Switches the applicable meshes to default-deny.
    ///
    /// # Errors
    ///
    /// Returns the first per-mesh error after every mesh was attempted.
    async fn start_enforcing(&self, meshes: &[Mesh]) -> Result<()>;

    /// Switches the applicable meshes to default-allow.
    ///
    /// # Errors
    ///
    /// Returns the first per-mesh error after every mesh was attempted.
    async fn stop_enforcing(&self, meshes: &[Mesh]) -> Result<()>;
}

/// Resolves the enforcement posture a mesh type has when a virtual mesh
/// leaves the choice to the mesh.
///
/// # Errors
///
/// Returns `ReconcileError::UnsupportedMeshType` for unrecognized providers.
pub fn default_enforcement(mesh: &Mesh) -> Result<bool> {
    match mesh.mesh_type {
        MeshType::AppMesh(_) => Ok(true),
        MeshType::Istio | MeshType::Linkerd | MeshType::ConsulConnect => Ok(false),
        MeshType::Unsupported => Err(ReconcileError::UnsupportedMeshType {
            mesh: mesh.metadata.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnforcerError;
    use crate::model::ObjectRef;
    use crate::testutil::app_mesh;

    fn mesh_of(mesh_type: MeshType) -> Mesh {
        Mesh {
            metadata: ObjectRef::new("m", "mesh-system"),
            mesh_type,
        }
    }

    #[test]
    fn test_app_mesh_defaults_to_enforced() {
        assert!(default_enforcement(&app_mesh()).expect("default"));
    }

    #[test]
    fn test_sidecar_meshes_default_to_open() {
        for mesh_type in [MeshType::Istio, MeshType::Linkerd, MeshType::ConsulConnect] {
            assert!(!default_enforcement(&mesh_of(mesh_type)).expect("default"));
        }
    }

    #[test]
    fn test_unsupported_mesh_is_an_error() {
        let err = default_enforcement(&mesh_of(MeshType::Unsupported)).expect_err("unsupported");
        assert!(matches!(
            err,
            EnforcerError::Reconcile(ReconcileError::UnsupportedMeshType { .. })
        ));
        assert!(err.is_invalid_input());
    }
}
