//! Store-backed topology resolver.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{Mesh, ObjectRef};
use crate::store::ResourceStore;

use super::graph::ServiceWorkloadGraph;
use super::snapshot::{TopologySnapshot, UpstreamMap};

/// Resolves service/workload topology and policy coverage for one mesh.
///
/// Each operation takes a fresh snapshot. Callers that need several answers
/// for the same cycle should call [`TopologyResolver::snapshot`] once and query it.
pub struct TopologyResolver<'a> {
    store: &'a dyn ResourceStore,
}

impl<'a> TopologyResolver<'a> {
    /// Creates a resolver reading from `store`.
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore) -> Self {
        Self { store }
    }

    /// Takes a topology snapshot for a mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if any list call fails.
    pub async fn snapshot(&self, mesh: &Mesh) -> Result<TopologySnapshot> {
        TopologySnapshot::fetch(self.store, &mesh.metadata).await
    }

    /// Builds the service/workload graph of a mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if any list call fails.
    pub async fn resolve_service_workload_pairs(&self, mesh: &Mesh) -> Result<ServiceWorkloadGraph> {
        Ok(self.snapshot(mesh).await?.service_workload_graph())
    }

    /// Maps every workload of a mesh to every service of the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if any list call fails.
    pub async fn resolve_all_upstream_services(&self, mesh: &Mesh) -> Result<UpstreamMap> {
        Ok(self.snapshot(mesh).await?.all_upstream_services())
    }

    /// Returns the services of a mesh covered by at least one policy.
    ///
    /// # Errors
    ///
    /// Returns an error if a list call fails or a selector cannot be evaluated.
    pub async fn resolve_services_with_policy(&self, mesh: &Mesh) -> Result<BTreeSet<ObjectRef>> {
        self.snapshot(mesh).await?.services_with_policy()
    }

    /// Returns the workloads of a mesh covered by at least one policy, with
    /// their allowed upstream services.
    ///
    /// # Errors
    ///
    /// Returns an error if a list call fails or a selector cannot be evaluated.
    pub async fn resolve_workloads_with_policy_and_upstreams(
        &self,
        mesh: &Mesh,
    ) -> Result<(BTreeSet<ObjectRef>, UpstreamMap)> {
        self.snapshot(mesh).await?.workloads_with_policy_and_upstreams()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnforcerError, StoreError};
    use crate::testutil::{app_mesh, service, workload, MemoryStore};

    #[tokio::test]
    async fn test_resolves_pairs_from_store() {
        let store = MemoryStore::default();
        store.add_service(service("reviews", &[("app", "reviews")]));
        store.add_service(service("details", &[("app", "details")]));
        store.add_workload(workload("reviews-v1", &[("app", "reviews")]));

        let resolver = TopologyResolver::new(&store);
        let graph = resolver
            .resolve_service_workload_pairs(&app_mesh())
            .await
            .expect("resolve pairs");

        assert_eq!(graph.service_to_workloads().len(), 2);
        assert_eq!(graph.backing_workloads(&ObjectRef::new("reviews", "default")).len(), 1);
    }

    #[tokio::test]
    async fn test_list_errors_propagate() {
        let store = MemoryStore::default();
        store.fail_lists("store offline");

        let resolver = TopologyResolver::new(&store);
        let result = resolver.resolve_all_upstream_services(&app_mesh()).await;

        assert!(matches!(
            result,
            Err(EnforcerError::Store(StoreError::Corrupted { .. }))
        ));
    }
}
