//! Per-cycle topology snapshot.
//!
//! A snapshot is assembled from three independent list calls. Nothing ties
//! those reads together, so a policy written between them may or may not be
//! seen; the next cycle corrects it.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::Result;
use crate::model::{AccessControlPolicy, MeshService, MeshWorkload, ObjectRef};
use crate::store::ResourceStore;

use super::graph::ServiceWorkloadGraph;
use super::selector::{select_services, select_workloads};

/// Workload -> the services it may reach.
pub type UpstreamMap = BTreeMap<ObjectRef, BTreeSet<ObjectRef>>;

/// Services, workloads and policies read for one mesh at the start of a cycle.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    mesh: ObjectRef,
    services: Vec<MeshService>,
    workloads: Vec<MeshWorkload>,
    policies: Vec<AccessControlPolicy>,
}

impl TopologySnapshot {
    /// Creates a snapshot from already-listed objects.
    ///
    /// Every list is sorted by identity, so results never depend on the order
    /// the store returned them in.
    #[must_use]
    pub fn new(
        mesh: ObjectRef,
        mut services: Vec<MeshService>,
        mut workloads: Vec<MeshWorkload>,
        mut policies: Vec<AccessControlPolicy>,
    ) -> Self {
        services.sort_by(|a, b| a.metadata.cmp(&b.metadata));
        workloads.sort_by(|a, b| a.metadata.cmp(&b.metadata));
        policies.sort_by(|a, b| a.metadata.cmp(&b.metadata));

        Self {
            mesh,
            services,
            workloads,
            policies,
        }
    }

    /// Reads services, workloads and policies from the store.
    ///
    /// # Errors
    ///
    /// Returns the first list error unchanged.
    pub async fn fetch(store: &dyn ResourceStore, mesh: &ObjectRef) -> Result<Self> {
        let services = store.list_mesh_services().await?;
        let workloads = store.list_mesh_workloads().await?;
        let policies = store.list_access_control_policies().await?;

        debug!(
            "Snapshot for mesh {mesh}: {} services, {} workloads, {} policies (all meshes)",
            services.len(),
            workloads.len(),
            policies.len()
        );

        Ok(Self::new(mesh.clone(), services, workloads, policies))
    }

    /// The mesh this snapshot was taken for.
    #[must_use]
    pub const fn mesh(&self) -> &ObjectRef {
        &self.mesh
    }

    /// Services owned by the mesh.
    pub fn mesh_services(&self) -> impl Iterator<Item = &MeshService> {
        self.services.iter().filter(|s| s.in_mesh(&self.mesh))
    }

    /// Workloads owned by the mesh.
    pub fn mesh_workloads(&self) -> impl Iterator<Item = &MeshWorkload> {
        self.workloads.iter().filter(|w| w.in_mesh(&self.mesh))
    }

    /// Builds the service/workload graph of the mesh.
    #[must_use]
    pub fn service_workload_graph(&self) -> ServiceWorkloadGraph {
        ServiceWorkloadGraph::build(self.mesh_services(), self.mesh_workloads())
    }

    /// Maps every workload of the mesh to every service of the mesh.
    #[must_use]
    pub fn all_upstream_services(&self) -> UpstreamMap {
        let services: BTreeSet<ObjectRef> =
            self.mesh_services().map(|s| s.metadata.clone()).collect();

        self.mesh_workloads()
            .map(|w| (w.metadata.clone(), services.clone()))
            .collect()
    }

    /// Mesh services selected as a destination by at least one policy.
    ///
    /// # Errors
    ///
    /// Returns an error if a destination selector cannot be evaluated.
    pub fn services_with_policy(&self) -> Result<BTreeSet<ObjectRef>> {
        let in_mesh = self.mesh_service_refs();
        let mut covered = BTreeSet::new();

        for policy in &self.policies {
            let selected = select_services(
                policy.destination_selector.as_ref(),
                &self.services,
                &policy.metadata,
            )?;
            covered.extend(selected.intersection(&in_mesh).cloned());
        }

        Ok(covered)
    }

    /// Mesh workloads selected as a source by at least one policy, with the
    /// union of the mesh services their policies allow them to reach.
    ///
    /// # Errors
    ///
    /// Returns an error if a selector cannot be evaluated.
    pub fn workloads_with_policy_and_upstreams(
        &self,
    ) -> Result<(BTreeSet<ObjectRef>, UpstreamMap)> {
        let services_in_mesh = self.mesh_service_refs();
        let workloads_in_mesh: BTreeSet<ObjectRef> =
            self.mesh_workloads().map(|w| w.metadata.clone()).collect();

        let mut declared = BTreeSet::new();
        let mut upstreams = UpstreamMap::new();

        for policy in &self.policies {
            let sources = select_workloads(
                policy.source_selector.as_ref(),
                &self.workloads,
                &policy.metadata,
            )?;
            let destinations: BTreeSet<ObjectRef> = select_services(
                policy.destination_selector.as_ref(),
                &self.services,
                &policy.metadata,
            )?
            .intersection(&services_in_mesh)
            .cloned()
            .collect();

            for workload in sources.intersection(&workloads_in_mesh) {
                upstreams
                    .entry(workload.clone())
                    .or_default()
                    .extend(destinations.iter().cloned());
                declared.insert(workload.clone());
            }
        }

        Ok((declared, upstreams))
    }

    fn mesh_service_refs(&self) -> BTreeSet<ObjectRef> {
        self.mesh_services().map(|s| s.metadata.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServiceSelector, WorkloadSelector};
    use crate::testutil::{matcher, policy, service, service_in_mesh, workload, MESH};

    fn refs(names: &[&str]) -> BTreeSet<ObjectRef> {
        names
            .iter()
            .map(|n| ObjectRef::new(*n, "default"))
            .collect()
    }

    #[test]
    fn test_snapshot_is_order_independent() {
        let a = TopologySnapshot::new(
            ObjectRef::new(MESH, "mesh-system"),
            vec![service("b", &[("app", "x")]), service("a", &[("app", "x")])],
            vec![workload("w2", &[("app", "x")]), workload("w1", &[("app", "x")])],
            vec![],
        );
        let b = TopologySnapshot::new(
            ObjectRef::new(MESH, "mesh-system"),
            vec![service("a", &[("app", "x")]), service("b", &[("app", "x")])],
            vec![workload("w1", &[("app", "x")]), workload("w2", &[("app", "x")])],
            vec![],
        );

        assert_eq!(a.service_workload_graph(), b.service_workload_graph());
    }

    #[test]
    fn test_all_upstreams_are_mesh_scoped() {
        let snapshot = TopologySnapshot::new(
            ObjectRef::new(MESH, "mesh-system"),
            vec![service("s1", &[]), service_in_mesh("other", "istio")],
            vec![workload("w1", &[]), workload("w2", &[])],
            vec![],
        );

        let upstreams = snapshot.all_upstream_services();
        assert_eq!(upstreams.len(), 2);
        for services in upstreams.values() {
            assert_eq!(services, &refs(&["s1"]));
        }
    }

    #[test]
    fn test_upstreams_accumulate_across_policies() {
        let snapshot = TopologySnapshot::new(
            ObjectRef::new(MESH, "mesh-system"),
            vec![service("s1", &[("app", "s1")]), service("s2", &[("app", "s2")])],
            vec![workload("w1", &[("role", "client")]), workload("w2", &[])],
            vec![
                policy(
                    "to-s1",
                    Some(WorkloadSelector::Matcher(matcher(&[("role", "client")]))),
                    Some(ServiceSelector::Matcher(matcher(&[("app", "s1")]))),
                ),
                policy(
                    "to-s2",
                    Some(WorkloadSelector::Matcher(matcher(&[("role", "client")]))),
                    Some(ServiceSelector::Matcher(matcher(&[("app", "s2")]))),
                ),
            ],
        );

        let (declared, upstreams) = snapshot
            .workloads_with_policy_and_upstreams()
            .expect("resolve workloads");

        assert_eq!(declared, refs(&["w1"]));
        assert_eq!(upstreams[&ObjectRef::new("w1", "default")], refs(&["s1", "s2"]));
        assert_eq!(
            snapshot.services_with_policy().expect("resolve services"),
            refs(&["s1", "s2"])
        );
    }

    #[test]
    fn test_policy_destinations_outside_mesh_are_dropped() {
        let snapshot = TopologySnapshot::new(
            ObjectRef::new(MESH, "mesh-system"),
            vec![service("s1", &[]), service_in_mesh("foreign", "istio")],
            vec![workload("w1", &[])],
            vec![policy("open", None, None)],
        );

        let covered = snapshot.services_with_policy().expect("resolve services");
        assert_eq!(covered, refs(&["s1"]));
    }
}
