//! App Mesh reconciliation for one mesh.
//!
//! A cycle takes a fresh topology snapshot, translates it, and converges
//! routers, services, nodes and routes in that order so that every resource
//! a later category references already exists.
//!
//! This order departs on purpose from the one a per-service walk would
//! suggest (virtual service, router, route, then nodes). A virtual service
//! with a router provider is rejected until the router exists, and a route
//! is rejected until every node it targets exists.

use serde::Serialize;
use std::future::Future;
use tracing::{info, warn};

use crate::error::{EnforcerError, ReconcileError, Result};
use crate::model::Mesh;
use crate::store::ResourceStore;
use crate::topology::TopologyResolver;

use super::client::{AppMeshClient, EnsureOutcome};
use super::desired::DesiredResources;
use super::translator::AppMeshTranslator;

/// Counts and failures of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Mesh identity.
    pub mesh: String,
    /// Whether enforced mode was used.
    pub enforced: bool,
    /// Default routes removed before an enforced cycle.
    pub default_routes_deleted: usize,
    /// Resources created.
    pub created: usize,
    /// Resources updated.
    pub updated: usize,
    /// Resources left as they were.
    pub unchanged: usize,
    /// One entry per category that stopped early.
    pub failures: Vec<String>,
}

impl ReconcileSummary {
    fn record(&mut self, outcome: EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created => self.created += 1,
            EnsureOutcome::Updated => self.updated += 1,
            EnsureOutcome::Unchanged => self.unchanged += 1,
        }
    }

    fn fail(&mut self, category: &str, error: &EnforcerError) {
        warn!("Failed to ensure {category} in mesh {}: {error}", self.mesh);
        self.failures.push(format!("{category}: {error}"));
    }
}

/// Ensures items in order, stopping at the first failure.
async fn ensure_all<'b, T, F, Fut>(
    items: &'b [T],
    summary: &mut ReconcileSummary,
    ensure: F,
) -> Option<EnforcerError>
where
    F: Fn(&'b T) -> Fut,
    Fut: Future<Output = Result<EnsureOutcome>>,
{
    for item in items {
        match ensure(item).await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => return Some(e),
        }
    }
    None
}

/// Reconciles one App Mesh mesh against the topology in the store.
pub struct AppMeshReconciler<'a> {
    store: &'a dyn ResourceStore,
    client: AppMeshClient,
    translator: AppMeshTranslator,
    surface_provider_errors: bool,
}

impl<'a> AppMeshReconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(store: &'a dyn ResourceStore, client: AppMeshClient) -> Self {
        Self {
            store,
            client,
            translator: AppMeshTranslator::new(),
            surface_provider_errors: true,
        }
    }

    /// Sets whether provider failures fail the cycle or are only logged.
    #[must_use]
    pub const fn with_surface_provider_errors(mut self, surface: bool) -> Self {
        self.surface_provider_errors = surface;
        self
    }

    /// Runs one reconciliation cycle.
    ///
    /// Resolver errors abort the cycle. Provider failures stop only their
    /// own category; they are returned as `ReconcileError::Incomplete` unless
    /// surfacing is disabled. Translation failures are always returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is not an App Mesh mesh, the topology
    /// cannot be resolved, or any category failed.
    pub async fn reconcile(&self, mesh: &Mesh, enforced: bool) -> Result<ReconcileSummary> {
        let spec = mesh.app_mesh().ok_or_else(|| ReconcileError::UnsupportedMeshType {
            mesh: mesh.metadata.to_string(),
        })?;

        info!(
            "Reconciling mesh {} (App Mesh {}, {})",
            mesh.metadata,
            spec.name,
            if enforced { "enforced" } else { "open" }
        );

        let mut summary = ReconcileSummary {
            mesh: mesh.metadata.to_string(),
            enforced,
            ..ReconcileSummary::default()
        };

        if enforced {
            match self.client.delete_all_default_routes(&spec.name).await {
                Ok(deleted) => summary.default_routes_deleted = deleted,
                Err(e) => summary.fail("default route cleanup", &e),
            }
        }

        let snapshot = TopologyResolver::new(self.store).snapshot(mesh).await?;
        let desired = DesiredResources::build(&self.translator, &snapshot, &spec.name, enforced)?;

        let client = &self.client;

        if let Some(e) = ensure_all(&desired.virtual_routers, &mut summary, |r| {
            client.ensure_virtual_router(r)
        })
        .await
        {
            summary.fail("virtual routers", &e);
        }

        if let Some(e) = ensure_all(&desired.virtual_services, &mut summary, |s| {
            client.ensure_virtual_service(s)
        })
        .await
        {
            summary.fail("virtual services", &e);
        }

        if let Some(e) = ensure_all(&desired.virtual_nodes, &mut summary, |n| {
            client.ensure_virtual_node(n)
        })
        .await
        {
            summary.fail("virtual nodes", &e);
        }

        if let Some(e) = ensure_all(&desired.routes, &mut summary, |r| client.ensure_route(r)).await
        {
            summary.fail("routes", &e);
        }

        let translation_failed = !desired.route_failures.is_empty();
        for message in &desired.route_failures {
            warn!("Failed to translate route in mesh {}: {message}", summary.mesh);
            summary.failures.push(format!("routes: {message}"));
        }

        info!(
            "Mesh {}: {} created, {} updated, {} unchanged, {} failed categories",
            summary.mesh,
            summary.created,
            summary.updated,
            summary.unchanged,
            summary.failures.len()
        );

        if !summary.failures.is_empty() && (self.surface_provider_errors || translation_failed) {
            return Err(ReconcileError::Incomplete {
                mesh: summary.mesh,
                failures: summary.failures,
            }
            .into());
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appmesh::naming::DEFAULT_ROUTE_NAME;
    use crate::model::{ObjectRef, ServiceSelector, WorkloadSelector};
    use crate::testutil::{app_mesh, matcher, policy, service, workload, FakeAppMesh, MemoryStore};
    use std::sync::Arc;

    fn populated_store() -> MemoryStore {
        let store = MemoryStore::default();
        store.add_service(service("s1", &[("app", "web")]));
        store.add_service(service("s2", &[("app", "api")]));
        store.add_workload(workload("w1", &[("app", "web")]));
        store.add_workload(workload("w2", &[("app", "api")]));
        store
    }

    #[tokio::test]
    async fn test_open_cycle_creates_then_converges() {
        let store = populated_store();
        let fake = Arc::new(FakeAppMesh::default());
        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()));

        let first = reconciler.reconcile(&app_mesh(), false).await.expect("first cycle");
        assert_eq!(first.created, 8);
        assert_eq!(first.updated, 0);

        let second = reconciler.reconcile(&app_mesh(), false).await.expect("second cycle");
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 8);
        assert_eq!(fake.write_count(), 8);
    }

    #[tokio::test]
    async fn test_enforced_cycle_removes_stale_default_routes() {
        let store = populated_store();
        let fake = Arc::new(FakeAppMesh::default());
        fake.seed_route("prod", "legacy.default", DEFAULT_ROUTE_NAME);

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()));
        let summary = reconciler.reconcile(&app_mesh(), true).await.expect("cycle");

        assert_eq!(summary.default_routes_deleted, 1);
        assert!(!fake.has_route("legacy.default", DEFAULT_ROUTE_NAME));
        // No policies: nothing is covered.
        assert_eq!(summary.created, 0);
    }

    #[tokio::test]
    async fn test_category_failure_does_not_block_others() {
        let store = populated_store();
        let fake = Arc::new(FakeAppMesh::default());
        fake.fail_kind("VirtualRouter");

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()));
        let result = reconciler.reconcile(&app_mesh(), false).await;

        match result {
            Err(EnforcerError::Reconcile(ReconcileError::Incomplete { failures, .. })) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("virtual routers"));
            }
            other => panic!("expected incomplete reconciliation, got {other:?}"),
        }
        assert_eq!(fake.count_of("VirtualNode"), 2);
        assert_eq!(fake.count_of("VirtualService"), 2);
    }

    #[tokio::test]
    async fn test_best_effort_mode_swallows_provider_failures() {
        let store = populated_store();
        let fake = Arc::new(FakeAppMesh::default());
        fake.fail_kind("VirtualNode");

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()))
            .with_surface_provider_errors(false);
        let summary = reconciler.reconcile(&app_mesh(), false).await.expect("cycle");

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(fake.count_of("Route"), 2);
    }

    #[tokio::test]
    async fn test_resolver_errors_abort() {
        let store = populated_store();
        store.fail_lists("store offline");
        let fake = Arc::new(FakeAppMesh::default());

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()));
        let result = reconciler.reconcile(&app_mesh(), false).await;

        assert!(matches!(result, Err(EnforcerError::Store(_))));
        assert_eq!(fake.write_count(), 0);
    }

    #[tokio::test]
    async fn test_enforced_cycle_writes_only_covered_entities() {
        let store = MemoryStore::default();
        for name in ["s1", "s2", "s3"] {
            store.add_service(service(name, &[("tier", "web")]));
        }
        store.add_workload(workload("w1", &[("tier", "web"), ("acp", "yes")]));
        store.add_workload(workload("w2", &[("tier", "web")]));
        store.add_workload(workload("w3", &[("tier", "web"), ("acp", "yes")]));
        store.add_policy(policy(
            "s1-s2-from-acp",
            Some(WorkloadSelector::Matcher(matcher(&[("acp", "yes")]))),
            Some(ServiceSelector::ServiceRefs(vec![
                ObjectRef::new("s1", "default"),
                ObjectRef::new("s2", "default"),
            ])),
        ));
        let fake = Arc::new(FakeAppMesh::default());

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()));
        let summary = reconciler.reconcile(&app_mesh(), true).await.expect("cycle");

        assert!(summary.failures.is_empty());
        assert_eq!(fake.names_of("VirtualService"), vec!["s1.default", "s2.default"]);
        assert_eq!(fake.names_of("VirtualRouter"), vec!["s1.default", "s2.default"]);
        assert_eq!(fake.names_of("VirtualNode"), vec!["w1.default", "w3.default"]);
        assert_eq!(
            fake.names_of("Route"),
            vec![
                format!("s1.default/{DEFAULT_ROUTE_NAME}"),
                format!("s2.default/{DEFAULT_ROUTE_NAME}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_default_route_cleanup_failure_is_reported() {
        let store = populated_store();
        let fake = Arc::new(FakeAppMesh::default());
        fake.seed_route("prod", "legacy.default", DEFAULT_ROUTE_NAME);
        fake.fail_kind("Route");

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()));
        let result = reconciler.reconcile(&app_mesh(), true).await;

        match result {
            Err(EnforcerError::Reconcile(ReconcileError::Incomplete { failures, .. })) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("default route cleanup"));
            }
            other => panic!("expected incomplete reconciliation, got {other:?}"),
        }
        assert!(fake.has_route("legacy.default", DEFAULT_ROUTE_NAME));
    }

    #[tokio::test]
    async fn test_translation_failure_surfaces_after_route_write_failure() {
        let store = MemoryStore::default();
        store.add_service(service("a-small", &[("app", "small")]));
        store.add_service(service("z-big", &[("app", "big")]));
        store.add_workload(workload("small", &[("app", "small")]));
        for i in 0..11 {
            store.add_workload(workload(&format!("big{i:02}"), &[("app", "big")]));
        }
        let fake = Arc::new(FakeAppMesh::default());
        fake.fail_kind("Route");

        let reconciler = AppMeshReconciler::new(&store, AppMeshClient::new(fake.clone()))
            .with_surface_provider_errors(false);
        let result = reconciler.reconcile(&app_mesh(), false).await;

        match result {
            Err(EnforcerError::Reconcile(ReconcileError::Incomplete { failures, .. })) => {
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().any(|f| f.contains("exceeding the maximum")));
            }
            other => panic!("expected incomplete reconciliation, got {other:?}"),
        }
    }
}
