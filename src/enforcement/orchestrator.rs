//! Virtual mesh event handling.
//!
//! The orchestrator turns lifecycle events on virtual meshes into start/stop
//! calls on every registered enforcer and writes the outcome back as the
//! virtual mesh's status. Each event runs to completion before `handle`
//! returns; overlapping events for the same mesh rely on the enforcers being
//! idempotent.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EnforcerError, Result};
use crate::model::{
    EnforcementPolicy, Mesh, ObjectRef, StatusState, VirtualMesh, VirtualMeshStatus,
};
use crate::store::ResourceStore;

use super::enforcer::{MeshEnforcer, default_enforcement};

/// A lifecycle event on a virtual mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyGroupEvent {
    /// The virtual mesh appeared.
    Created(VirtualMesh),
    /// The virtual mesh or the topology under it changed.
    Updated(VirtualMesh),
    /// The virtual mesh was removed. Carries its last known state.
    Deleted(VirtualMesh),
    /// Any other notification. Ignored.
    Generic(VirtualMesh),
}

impl PolicyGroupEvent {
    /// The virtual mesh the event is about.
    #[must_use]
    pub const fn virtual_mesh(&self) -> &VirtualMesh {
        match self {
            Self::Created(vm) | Self::Updated(vm) | Self::Deleted(vm) | Self::Generic(vm) => vm,
        }
    }

    /// Short event kind for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
            Self::Generic(_) => "generic",
        }
    }
}

/// Meshes split by the posture they should end up in.
#[derive(Debug, Default)]
struct Partition {
    enforced: Vec<Mesh>,
    open: Vec<Mesh>,
}

/// Dispatches virtual mesh events to mesh enforcers.
pub struct EnforcementOrchestrator {
    store: Arc<dyn ResourceStore>,
    enforcers: Vec<Arc<dyn MeshEnforcer>>,
}

impl EnforcementOrchestrator {
    /// Creates an orchestrator with no enforcers.
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            enforcers: Vec::new(),
        }
    }

    /// Registers an enforcer.
    #[must_use]
    pub fn with_enforcer(mut self, enforcer: Arc<dyn MeshEnforcer>) -> Self {
        self.enforcers.push(enforcer);
        self
    }

    /// Handles one event.
    ///
    /// Returns the status written for created and updated virtual meshes.
    /// Enforcement failures end up in that status, not in the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be written, or if stopping
    /// enforcement for a deleted virtual mesh fails.
    pub async fn handle(&self, event: &PolicyGroupEvent) -> Result<Option<VirtualMeshStatus>> {
        let vm = event.virtual_mesh();
        debug!("Virtual mesh {} {}", vm.metadata, event.kind());

        match event {
            PolicyGroupEvent::Created(vm) | PolicyGroupEvent::Updated(vm) => {
                let status = match self.enforce(vm).await {
                    Ok(()) => VirtualMeshStatus::accepted(),
                    Err(e) => status_for_error(&vm.metadata, &e),
                };
                self.store
                    .update_virtual_mesh_status(&vm.metadata, &status)
                    .await?;
                info!(
                    "Virtual mesh {}: {}",
                    vm.metadata, status.access_control_enforcement.state
                );
                Ok(Some(status))
            }
            PolicyGroupEvent::Deleted(vm) => {
                self.unwind(vm).await?;
                Ok(None)
            }
            PolicyGroupEvent::Generic(_) => Ok(None),
        }
    }

    /// Handles every stored virtual mesh as a created event.
    ///
    /// # Errors
    ///
    /// Returns an error if virtual meshes cannot be listed or a status cannot
    /// be written.
    pub async fn process_all(&self) -> Result<Vec<(ObjectRef, VirtualMeshStatus)>> {
        let virtual_meshes = self.store.list_virtual_meshes().await?;
        info!("Processing {} virtual meshes", virtual_meshes.len());

        let mut statuses = Vec::with_capacity(virtual_meshes.len());
        for vm in virtual_meshes {
            let metadata = vm.metadata.clone();
            if let Some(status) = self.handle(&PolicyGroupEvent::Created(vm)).await? {
                statuses.push((metadata, status));
            }
        }
        Ok(statuses)
    }

    async fn enforce(&self, vm: &VirtualMesh) -> Result<()> {
        let mut meshes = Vec::with_capacity(vm.meshes.len());
        for mesh_ref in &vm.meshes {
            meshes.push(self.store.get_mesh(mesh_ref).await?);
        }

        let mut first_error: Option<EnforcerError> = None;
        let partition = match vm.enforce_access_control {
            EnforcementPolicy::Enabled => Partition {
                enforced: meshes,
                open: Vec::new(),
            },
            EnforcementPolicy::Disabled => Partition {
                enforced: Vec::new(),
                open: meshes,
            },
            EnforcementPolicy::MeshDefault => {
                let mut partition = Partition::default();
                for mesh in meshes {
                    match default_enforcement(&mesh) {
                        Ok(true) => partition.enforced.push(mesh),
                        Ok(false) => partition.open.push(mesh),
                        Err(e) => {
                            warn!("Skipping mesh {}: {e}", mesh.metadata);
                            first_error.get_or_insert(e);
                        }
                    }
                }
                partition
            }
        };

        debug!(
            "Virtual mesh {}: {} meshes enforced, {} open",
            vm.metadata,
            partition.enforced.len(),
            partition.open.len()
        );

        for enforcer in &self.enforcers {
            if !partition.enforced.is_empty() {
                if let Err(e) = enforcer.start_enforcing(&partition.enforced).await {
                    warn!("Enforcer {} failed to start enforcing: {e}", enforcer.name());
                    first_error.get_or_insert(e);
                }
            }
            if !partition.open.is_empty() {
                if let Err(e) = enforcer.stop_enforcing(&partition.open).await {
                    warn!("Enforcer {} failed to stop enforcing: {e}", enforcer.name());
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn unwind(&self, vm: &VirtualMesh) -> Result<()> {
        let mut meshes = Vec::with_capacity(vm.meshes.len());
        for mesh_ref in &vm.meshes {
            match self.store.get_mesh(mesh_ref).await {
                Ok(mesh) => meshes.push(mesh),
                Err(e) => debug!("Mesh {mesh_ref} no longer resolves: {e}"),
            }
        }

        if meshes.is_empty() {
            return Ok(());
        }

        let mut first_error: Option<EnforcerError> = None;
        for enforcer in &self.enforcers {
            if let Err(e) = enforcer.stop_enforcing(&meshes).await {
                warn!("Enforcer {} failed to unwind: {e}", enforcer.name());
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

fn status_for_error(virtual_mesh: &ObjectRef, error: &EnforcerError) -> VirtualMeshStatus {
    let state = if error.is_invalid_input() {
        StatusState::Invalid
    } else {
        StatusState::ProcessingError
    };
    warn!("Enforcement for virtual mesh {virtual_mesh} failed: {error}");
    VirtualMeshStatus::new(state, Some(error.to_string()))
}
