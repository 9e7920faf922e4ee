//! Local file-based resource store backend.
//!
//! This module provides a file-based store: a YAML topology manifest and a
//! JSON status document, both re-read on every call so that each cycle sees a
//! fresh view of the topology.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{EnforcerError, Result, StoreError};
use crate::model::{
    AccessControlPolicy, Mesh, MeshService, MeshWorkload, ObjectRef, VirtualMesh,
    VirtualMeshStatus,
};

use super::manifest::{fingerprint, Manifest, StatusFile};
use super::resource_store::ResourceStore;

/// Default status directory name.
const STATUS_DIR: &str = ".mesh-enforcer";

/// Status file name.
const STATUS_FILE: &str = "status.json";

/// Local file-based resource store.
#[derive(Debug)]
pub struct LocalResourceStore {
    /// Path to the topology manifest.
    manifest_path: PathBuf,
    /// Path to the status document.
    status_path: PathBuf,
    /// Serializes read-modify-write cycles on the status document.
    status_lock: Mutex<()>,
}

impl LocalResourceStore {
    /// Creates a store whose status document lives in `.mesh-enforcer/`
    /// next to the manifest.
    #[must_use]
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        let manifest_path = manifest_path.into();
        let status_path = manifest_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
            .join(STATUS_DIR)
            .join(STATUS_FILE);

        Self::with_status_path(manifest_path, status_path)
    }

    /// Creates a store with a custom status document path.
    #[must_use]
    pub fn with_status_path(
        manifest_path: impl Into<PathBuf>,
        status_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            status_path: status_path.into(),
            status_lock: Mutex::new(()),
        }
    }

    /// Path to the topology manifest.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Reads the raw manifest bytes.
    async fn read_manifest_bytes(&self) -> Result<Vec<u8>> {
        fs::read(&self.manifest_path).await.map_err(|e| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!(
                    "Failed to read manifest {}: {e}",
                    self.manifest_path.display()
                ),
            })
        })
    }

    /// Loads and parses the manifest.
    async fn load_manifest(&self) -> Result<Manifest> {
        let bytes = self.read_manifest_bytes().await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!("Invalid UTF-8 in manifest: {e}"),
            })
        })?;

        Manifest::from_yaml(&content, &self.manifest_path.display().to_string())
    }

    /// Loads the status document, or an empty one if none was written yet.
    async fn load_statuses(&self) -> Result<StatusFile> {
        if !self.status_path.exists() {
            debug!("Status file does not exist: {}", self.status_path.display());
            return Ok(StatusFile::new());
        }

        let content = fs::read_to_string(&self.status_path).await.map_err(|e| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!("Failed to read status file: {e}"),
            })
        })?;

        StatusFile::from_json(&content)
    }

    /// Writes the status document atomically.
    async fn save_statuses(&self, statuses: &StatusFile) -> Result<()> {
        let dir = self
            .status_path
            .parent()
            .filter(|d| !d.as_os_str().is_empty() && !d.exists());
        if let Some(dir) = dir {
            debug!("Creating status directory: {}", dir.display());
            fs::create_dir_all(dir).await?;
        }

        let content = statuses.to_json()?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.status_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.status_path).await?;

        debug!("Statuses saved to {}", self.status_path.display());
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for LocalResourceStore {
    async fn list_meshes(&self) -> Result<Vec<Mesh>> {
        Ok(self.load_manifest().await?.meshes)
    }

    async fn list_mesh_services(&self) -> Result<Vec<MeshService>> {
        Ok(self.load_manifest().await?.mesh_services)
    }

    async fn list_mesh_workloads(&self) -> Result<Vec<MeshWorkload>> {
        Ok(self.load_manifest().await?.mesh_workloads)
    }

    async fn list_access_control_policies(&self) -> Result<Vec<AccessControlPolicy>> {
        Ok(self.load_manifest().await?.access_control_policies)
    }

    async fn list_virtual_meshes(&self) -> Result<Vec<VirtualMesh>> {
        let manifest = self.load_manifest().await?;
        let statuses = self.load_statuses().await?;
        Ok(manifest.virtual_meshes_with_status(&statuses))
    }

    async fn update_virtual_mesh_status(
        &self,
        virtual_mesh: &ObjectRef,
        status: &VirtualMeshStatus,
    ) -> Result<()> {
        let _guard = self.status_lock.lock().await;

        let mut statuses = self.load_statuses().await?;
        statuses.set(virtual_mesh, status.clone());
        self.save_statuses(&statuses).await?;

        info!(
            "Updated status of virtual mesh {virtual_mesh}: {}",
            status.access_control_enforcement.state
        );
        Ok(())
    }

    async fn fingerprint(&self) -> Result<String> {
        Ok(fingerprint(&self.read_manifest_bytes().await?))
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusState;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
meshes:
  - metadata: { name: appmesh, namespace: mesh-system }
    meshType: { type: appMesh, name: prod, awsAccountId: "123456789012", region: us-east-1 }
virtualMeshes:
  - metadata: { name: vm, namespace: mesh-system }
    meshes:
      - { name: appmesh, namespace: mesh-system }
"#;

    async fn create_test_store() -> (LocalResourceStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manifest_path = temp_dir.path().join("topology.yaml");
        fs::write(&manifest_path, MANIFEST)
            .await
            .expect("Failed to write manifest");
        let store = LocalResourceStore::new(manifest_path);
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_list_and_get_mesh() {
        let (store, _temp) = create_test_store().await;

        let meshes = store.list_meshes().await.expect("list meshes");
        assert_eq!(meshes.len(), 1);

        let mesh = store
            .get_mesh(&ObjectRef::new("appmesh", "mesh-system"))
            .await
            .expect("get mesh");
        assert!(mesh.app_mesh().is_some());
    }

    #[tokio::test]
    async fn test_get_missing_mesh() {
        let (store, _temp) = create_test_store().await;

        let result = store.get_mesh(&ObjectRef::new("missing", "mesh-system")).await;
        assert!(matches!(
            result,
            Err(EnforcerError::Store(StoreError::NotFound { kind: "Mesh", .. }))
        ));
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let (store, _temp) = create_test_store().await;
        let vm_ref = ObjectRef::new("vm", "mesh-system");

        let before = store.list_virtual_meshes().await.expect("list vms");
        assert!(before[0].status.is_none());

        let status = VirtualMeshStatus::new(
            StatusState::ProcessingError,
            Some(String::from("boom")),
        );
        store
            .update_virtual_mesh_status(&vm_ref, &status)
            .await
            .expect("update status");

        let after = store.list_virtual_meshes().await.expect("list vms");
        let written = after[0].status.as_ref().expect("status present");
        assert_eq!(
            written.access_control_enforcement.state,
            StatusState::ProcessingError
        );
        assert_eq!(
            written.access_control_enforcement.message.as_deref(),
            Some("boom")
        );
    }

    #[tokio::test]
    async fn test_status_write_does_not_change_fingerprint() {
        let (store, _temp) = create_test_store().await;
        let before = store.fingerprint().await.expect("fingerprint");

        store
            .update_virtual_mesh_status(
                &ObjectRef::new("vm", "mesh-system"),
                &VirtualMeshStatus::accepted(),
            )
            .await
            .expect("update status");

        assert_eq!(before, store.fingerprint().await.expect("fingerprint"));
    }
}
