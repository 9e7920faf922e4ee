//! Mesh services and mesh workloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::mesh::ObjectRef;

/// Cluster-local DNS suffix for Kubernetes services.
const CLUSTER_DNS_SUFFIX: &str = "svc.cluster.local";

/// A logical service scoped to one mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshService {
    /// Identity of the mesh service object.
    pub metadata: ObjectRef,
    /// Owning mesh.
    pub mesh: ObjectRef,
    /// The Kubernetes service backing this mesh service.
    pub kube_service: KubeServiceRef,
    /// Labels a workload must carry to back this service.
    #[serde(default)]
    pub workload_selector_labels: BTreeMap<String, String>,
    /// Labels on the service itself, used by destination selectors.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Ports exposed by the service.
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// Reference to a Kubernetes service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeServiceRef {
    /// Service name.
    pub name: String,
    /// Service namespace.
    pub namespace: String,
    /// Cluster the service lives in.
    #[serde(default)]
    pub cluster: Option<String>,
}

/// A port exposed by a mesh service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    /// Optional port name.
    #[serde(default)]
    pub name: Option<String>,
    /// Port number.
    pub port: u16,
    /// Protocol as declared on the service.
    pub protocol: String,
}

/// A logical workload (pod group) scoped to one mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshWorkload {
    /// Identity of the mesh workload object.
    pub metadata: ObjectRef,
    /// Owning mesh.
    pub mesh: ObjectRef,
    /// The controller (deployment, statefulset) owning the pods.
    pub kube_controller: KubeControllerRef,
    /// Pod labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Service account the pods run as.
    #[serde(default)]
    pub service_account: Option<String>,
    /// Container ports.
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

/// Reference to a Kubernetes pod controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeControllerRef {
    /// Controller name.
    pub name: String,
    /// Controller namespace.
    pub namespace: String,
    /// Cluster the controller lives in.
    #[serde(default)]
    pub cluster: Option<String>,
}

/// A container port on a mesh workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    /// Optional port name.
    #[serde(default)]
    pub name: Option<String>,
    /// Port number.
    pub port: u16,
    /// Protocol as declared on the container.
    pub protocol: String,
}

impl MeshService {
    /// Returns the cluster-local DNS name of the backing Kubernetes service.
    #[must_use]
    pub fn local_dns_name(&self) -> String {
        format!(
            "{}.{}.{CLUSTER_DNS_SUFFIX}",
            self.kube_service.name, self.kube_service.namespace
        )
    }

    /// Returns true if this service belongs to the given mesh.
    #[must_use]
    pub fn in_mesh(&self, mesh: &ObjectRef) -> bool {
        &self.mesh == mesh
    }
}

impl MeshWorkload {
    /// Returns true if this workload belongs to the given mesh.
    #[must_use]
    pub fn in_mesh(&self, mesh: &ObjectRef) -> bool {
        &self.mesh == mesh
    }

    /// Namespace the workload's pods run in.
    #[must_use]
    pub fn pod_namespace(&self) -> &str {
        &self.kube_controller.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_dns_name() {
        let service = MeshService {
            metadata: ObjectRef::new("reviews-default-cluster1", "mesh-system"),
            mesh: ObjectRef::new("appmesh", "mesh-system"),
            kube_service: KubeServiceRef {
                name: String::from("reviews"),
                namespace: String::from("bookinfo"),
                cluster: None,
            },
            workload_selector_labels: BTreeMap::new(),
            labels: BTreeMap::new(),
            ports: vec![],
        };

        assert_eq!(service.local_dns_name(), "reviews.bookinfo.svc.cluster.local");
    }
}
