//! Topology manifest and status document formats.
//!
//! The manifest is the YAML form of everything discovery would have written
//! into the store. Statuses live in a separate JSON document so that writing a
//! status never rewrites the operator-owned manifest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::{EnforcerError, Result, StoreError};
use crate::model::{
    AccessControlPolicy, Mesh, MeshService, MeshWorkload, ObjectRef, VirtualMesh,
    VirtualMeshStatus,
};

/// Current version of the status document format.
pub const STATUS_VERSION: &str = "1.0";

/// The declarative topology held by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Meshes.
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    /// Mesh services.
    #[serde(default)]
    pub mesh_services: Vec<MeshService>,
    /// Mesh workloads.
    #[serde(default)]
    pub mesh_workloads: Vec<MeshWorkload>,
    /// Access-control policies.
    #[serde(default)]
    pub access_control_policies: Vec<AccessControlPolicy>,
    /// Virtual meshes.
    #[serde(default)]
    pub virtual_meshes: Vec<VirtualMesh>,
}

/// Persisted statuses of virtual meshes, keyed by `namespace/name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFile {
    /// Status format version.
    pub version: String,
    /// Status per virtual mesh.
    #[serde(default)]
    pub statuses: BTreeMap<String, VirtualMeshStatus>,
}

impl Manifest {
    /// Parses a manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(content: &str, location: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!("Failed to parse manifest {location}: {e}"),
            })
        })
    }

    /// Returns the virtual meshes with statuses from `statuses` attached.
    #[must_use]
    pub fn virtual_meshes_with_status(&self, statuses: &StatusFile) -> Vec<VirtualMesh> {
        self.virtual_meshes
            .iter()
            .cloned()
            .map(|mut vm| {
                if let Some(status) = statuses.get(&vm.metadata) {
                    vm.status = Some(status.clone());
                }
                vm
            })
            .collect()
    }

    /// Returns true if a virtual mesh with this identity is declared.
    #[must_use]
    pub fn has_virtual_mesh(&self, virtual_mesh: &ObjectRef) -> bool {
        self.virtual_meshes
            .iter()
            .any(|vm| &vm.metadata == virtual_mesh)
    }
}

impl StatusFile {
    /// Creates an empty status document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATUS_VERSION.to_string(),
            statuses: BTreeMap::new(),
        }
    }

    /// Parses a status document from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!("Failed to parse status document: {e}"),
            })
        })
    }

    /// Serializes the status document to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            EnforcerError::Store(StoreError::serialization(format!(
                "Failed to serialize status document: {e}"
            )))
        })
    }

    /// Gets the status of a virtual mesh.
    #[must_use]
    pub fn get(&self, virtual_mesh: &ObjectRef) -> Option<&VirtualMeshStatus> {
        self.statuses.get(&virtual_mesh.to_string())
    }

    /// Sets the status of a virtual mesh.
    pub fn set(&mut self, virtual_mesh: &ObjectRef, status: VirtualMeshStatus) {
        self.statuses.insert(virtual_mesh.to_string(), status);
    }
}

impl Default for StatusFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the hex sha256 digest of raw manifest content.
#[must_use]
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
