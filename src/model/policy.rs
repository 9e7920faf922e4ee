//! Access-control policies and virtual meshes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::mesh::ObjectRef;

/// One allow-edge: source workloads may reach destination services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicy {
    /// Identity of the policy object.
    pub metadata: ObjectRef,
    /// Workloads allowed to send traffic. `None` selects every workload.
    #[serde(default)]
    pub source_selector: Option<WorkloadSelector>,
    /// Services that may receive traffic. `None` selects every service.
    #[serde(default)]
    pub destination_selector: Option<ServiceSelector>,
}

/// Selects workloads by labels or by the service account they run as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkloadSelector {
    /// Match workloads by pod labels and namespaces.
    Matcher(LabelMatcher),
    /// Match workloads running as one of these service accounts.
    ServiceAccounts(Vec<ObjectRef>),
}

/// Selects services by labels or by explicit reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceSelector {
    /// Match services by service labels and namespaces.
    Matcher(LabelMatcher),
    /// Match exactly these Kubernetes services.
    ServiceRefs(Vec<ObjectRef>),
}

/// Label and namespace constraints. Empty fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatcher {
    /// Labels that must all be present with equal values.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Namespaces to match in. Empty means any namespace.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// The policy-group object grouping meshes under one enforcement setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMesh {
    /// Identity of the virtual mesh object.
    pub metadata: ObjectRef,
    /// Meshes grouped by this virtual mesh.
    #[serde(default)]
    pub meshes: Vec<ObjectRef>,
    /// Whether access control is enforced.
    #[serde(default)]
    pub enforce_access_control: EnforcementPolicy,
    /// Last written status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VirtualMeshStatus>,
}

/// Tri-state access-control toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementPolicy {
    /// Enforce access control on every grouped mesh.
    Enabled,
    /// Open every grouped mesh.
    Disabled,
    /// Use each mesh type's default posture.
    #[default]
    MeshDefault,
}

/// Status written back onto a virtual mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMeshStatus {
    /// Outcome of the last enforcement cycle.
    pub access_control_enforcement: EnforcementStatus,
    /// When the status was computed.
    pub observed_at: DateTime<Utc>,
}

/// Outcome of one enforcement cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementStatus {
    /// Outcome state.
    pub state: StatusState,
    /// Error message for failed cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome states reported on a virtual mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    /// Not processed yet.
    Pending,
    /// Enforcement applied.
    Accepted,
    /// Enforcement failed.
    ProcessingError,
    /// The virtual mesh references something that cannot be enforced.
    Invalid,
}

impl VirtualMeshStatus {
    /// Creates a status stamped with the current time.
    #[must_use]
    pub fn new(state: StatusState, message: Option<String>) -> Self {
        Self {
            access_control_enforcement: EnforcementStatus { state, message },
            observed_at: Utc::now(),
        }
    }

    /// Creates an accepted status.
    #[must_use]
    pub fn accepted() -> Self {
        Self::new(StatusState::Accepted, None)
    }
}

impl fmt::Display for EnforcementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let policy = match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
            Self::MeshDefault => "MESH_DEFAULT",
        };
        write!(f, "{policy}")
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::ProcessingError => "PROCESSING_ERROR",
            Self::Invalid => "INVALID",
        };
        write!(f, "{state}")
    }
}
