//! App Mesh enforcer.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::enforcement::MeshEnforcer;
use crate::error::{EnforcerError, ReconcileError, Result};
use crate::model::Mesh;
use crate::store::ResourceStore;

use super::client::AppMeshClient;
use super::credentials::CredentialResolver;
use super::sdk::AppMeshApiFactory;
use super::reconciler::{AppMeshReconciler, ReconcileSummary};

/// Enforces access control on App Mesh meshes.
///
/// Credentials are resolved and a provider client is built once per mesh
/// per call; a failing mesh does not stop the others.
pub struct AppMeshEnforcer {
    store: Arc<dyn ResourceStore>,
    credentials: Arc<dyn CredentialResolver>,
    factory: Arc<dyn AppMeshApiFactory>,
    surface_provider_errors: bool,
}

impl AppMeshEnforcer {
    /// Creates an enforcer.
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        credentials: Arc<dyn CredentialResolver>,
        factory: Arc<dyn AppMeshApiFactory>,
    ) -> Self {
        Self {
            store,
            credentials,
            factory,
            surface_provider_errors: true,
        }
    }

    /// Sets whether provider failures fail the cycle or are only logged.
    #[must_use]
    pub const fn with_surface_provider_errors(mut self, surface: bool) -> Self {
        self.surface_provider_errors = surface;
        self
    }

    /// Reconciles one mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is not an App Mesh mesh, its account has
    /// no credentials, or reconciliation fails.
    pub async fn reconcile_mesh(&self, mesh: &Mesh, enforced: bool) -> Result<ReconcileSummary> {
        let spec = mesh.app_mesh().ok_or_else(|| ReconcileError::UnsupportedMeshType {
            mesh: mesh.metadata.to_string(),
        })?;

        let credentials = self.credentials.resolve(&spec.aws_account_id).await?;
        let api = self.factory.create(spec, credentials)?;

        AppMeshReconciler::new(self.store.as_ref(), AppMeshClient::new(api))
            .with_surface_provider_errors(self.surface_provider_errors)
            .reconcile(mesh, enforced)
            .await
    }

    async fn reconcile_all(&self, meshes: &[Mesh], enforced: bool) -> Result<()> {
        let mut first_error: Option<EnforcerError> = None;

        for mesh in meshes.iter().filter(|m| self.applies(m)) {
            match self.reconcile_mesh(mesh, enforced).await {
                Ok(summary) => info!(
                    "Mesh {} reconciled: {} created, {} updated, {} unchanged",
                    summary.mesh, summary.created, summary.updated, summary.unchanged
                ),
                Err(e) => {
                    warn!("Mesh {} failed to reconcile: {e}", mesh.metadata);
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl MeshEnforcer for AppMeshEnforcer {
    fn name(&self) -> &'static str {
        "appmesh"
    }

    fn applies(&self, mesh: &Mesh) -> bool {
        mesh.app_mesh().is_some()
    }

    async fn start_enforcing(&self, meshes: &[Mesh]) -> Result<()> {
        self.reconcile_all(meshes, true).await
    }

    async fn stop_enforcing(&self, meshes: &[Mesh]) -> Result<()> {
        self.reconcile_all(meshes, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appmesh::credentials::{AccountCredentials, StaticCredentialResolver};
    use crate::model::{MeshType, ObjectRef};
    use crate::testutil::{FakeAppMesh, FakeAppMeshFactory, MemoryStore, app_mesh, service, workload};

    fn resolver() -> StaticCredentialResolver {
        let mut resolver = StaticCredentialResolver::new();
        resolver.insert("123456789012", AccountCredentials::from_keys("AKID", "secret"));
        resolver
    }

    fn enforcer(
        store: Arc<MemoryStore>,
        resolver: StaticCredentialResolver,
        fake: Arc<FakeAppMesh>,
    ) -> AppMeshEnforcer {
        AppMeshEnforcer::new(
            store,
            Arc::new(resolver),
            Arc::new(FakeAppMeshFactory::new(fake)),
        )
    }

    #[tokio::test]
    async fn test_other_providers_are_skipped() {
        let fake = Arc::new(FakeAppMesh::default());
        let enforcer = enforcer(Arc::new(MemoryStore::default()), resolver(), fake.clone());
        let istio = Mesh {
            metadata: ObjectRef::new("istio", "mesh-system"),
            mesh_type: MeshType::Istio,
        };

        assert!(!enforcer.applies(&istio));
        enforcer.start_enforcing(&[istio]).await.expect("skip");
        assert_eq!(fake.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_the_mesh() {
        let fake = Arc::new(FakeAppMesh::default());
        let enforcer = enforcer(
            Arc::new(MemoryStore::default()),
            StaticCredentialResolver::new(),
            fake,
        );

        let result = enforcer.start_enforcing(&[app_mesh()]).await;
        assert!(matches!(
            result,
            Err(EnforcerError::Reconcile(ReconcileError::MissingCredentials { .. }))
        ));
    }

    #[tokio::test]
    async fn test_failing_mesh_does_not_stop_the_next() {
        let store = Arc::new(MemoryStore::default());
        store.add_service(service("s1", &[("app", "web")]));
        store.add_workload(workload("w1", &[("app", "web")]));

        let mut other = app_mesh();
        if let MeshType::AppMesh(spec) = &mut other.mesh_type {
            spec.aws_account_id = String::from("999999999999");
        }
        other.metadata = ObjectRef::new("other", "mesh-system");

        let fake = Arc::new(FakeAppMesh::default());
        let enforcer = enforcer(store, resolver(), fake.clone());

        let result = enforcer.stop_enforcing(&[other, app_mesh()]).await;

        assert!(result.is_err());
        assert_eq!(fake.write_count(), 4);
    }
}
