//! Idempotent App Mesh resource synchronization.
//!
//! Each `ensure_*` call makes at most one read and one write: describe the
//! resource, then create it if absent, update it if the matcher says it
//! drifted, or leave it alone.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

use super::api::{AppMeshApi, Paginator};
use super::matcher::{routes_equal, virtual_nodes_equal, virtual_routers_equal, virtual_services_equal};
use super::naming::DEFAULT_ROUTE_NAME;
use super::types::{RouteData, RouteRef, VirtualNodeData, VirtualRouterData, VirtualServiceData};

/// What an `ensure_*` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The resource did not exist and was created.
    Created,
    /// The resource existed with a different spec and was updated.
    Updated,
    /// The resource already matched.
    Unchanged,
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Decides the write for a describe result.
fn decide<T>(observed: Result<T>, is_equal: impl FnOnce(&T) -> bool) -> Result<EnsureOutcome> {
    match observed {
        Ok(current) if is_equal(&current) => Ok(EnsureOutcome::Unchanged),
        Ok(_) => Ok(EnsureOutcome::Updated),
        Err(e) if e.is_not_found() => Ok(EnsureOutcome::Created),
        Err(e) => Err(e),
    }
}

/// App Mesh client that converges one resource per call.
#[derive(Clone)]
pub struct AppMeshClient {
    api: Arc<dyn AppMeshApi>,
}

impl AppMeshClient {
    /// Creates a client over an API implementation.
    #[must_use]
    pub fn new(api: Arc<dyn AppMeshApi>) -> Self {
        Self { api }
    }

    /// Converges a virtual service.
    ///
    /// # Errors
    ///
    /// Returns describe errors other than not-found, and create/update errors.
    pub async fn ensure_virtual_service(&self, desired: &VirtualServiceData) -> Result<EnsureOutcome> {
        let observed = self
            .api
            .describe_virtual_service(&desired.mesh_name, &desired.virtual_service_name)
            .await;
        let outcome = decide(observed, |current| virtual_services_equal(desired, current))?;

        match outcome {
            EnsureOutcome::Created => {
                self.api.create_virtual_service(desired).await?;
            }
            EnsureOutcome::Updated => {
                self.api.update_virtual_service(desired).await?;
            }
            EnsureOutcome::Unchanged => {}
        }

        debug!("Virtual service {}: {outcome}", desired.virtual_service_name);
        Ok(outcome)
    }

    /// Converges a virtual router.
    ///
    /// # Errors
    ///
    /// Returns describe errors other than not-found, and create/update errors.
    pub async fn ensure_virtual_router(&self, desired: &VirtualRouterData) -> Result<EnsureOutcome> {
        let observed = self
            .api
            .describe_virtual_router(&desired.mesh_name, &desired.virtual_router_name)
            .await;
        let outcome = decide(observed, |current| virtual_routers_equal(desired, current))?;

        match outcome {
            EnsureOutcome::Created => {
                self.api.create_virtual_router(desired).await?;
            }
            EnsureOutcome::Updated => {
                self.api.update_virtual_router(desired).await?;
            }
            EnsureOutcome::Unchanged => {}
        }

        debug!("Virtual router {}: {outcome}", desired.virtual_router_name);
        Ok(outcome)
    }

    /// Converges a route.
    ///
    /// # Errors
    ///
    /// Returns describe errors other than not-found, and create/update errors.
    pub async fn ensure_route(&self, desired: &RouteData) -> Result<EnsureOutcome> {
        let observed = self
            .api
            .describe_route(
                &desired.mesh_name,
                &desired.virtual_router_name,
                &desired.route_name,
            )
            .await;
        let outcome = decide(observed, |current| routes_equal(desired, current))?;

        match outcome {
            EnsureOutcome::Created => {
                self.api.create_route(desired).await?;
            }
            EnsureOutcome::Updated => {
                self.api.update_route(desired).await?;
            }
            EnsureOutcome::Unchanged => {}
        }

        debug!(
            "Route {} on {}: {outcome}",
            desired.route_name, desired.virtual_router_name
        );
        Ok(outcome)
    }

    /// Converges a virtual node.
    ///
    /// # Errors
    ///
    /// Returns describe errors other than not-found, and create/update errors.
    pub async fn ensure_virtual_node(&self, desired: &VirtualNodeData) -> Result<EnsureOutcome> {
        let observed = self
            .api
            .describe_virtual_node(&desired.mesh_name, &desired.virtual_node_name)
            .await;
        let outcome = decide(observed, |current| virtual_nodes_equal(desired, current))?;

        match outcome {
            EnsureOutcome::Created => {
                self.api.create_virtual_node(desired).await?;
            }
            EnsureOutcome::Updated => {
                self.api.update_virtual_node(desired).await?;
            }
            EnsureOutcome::Unchanged => {}
        }

        debug!("Virtual node {}: {outcome}", desired.virtual_node_name);
        Ok(outcome)
    }

    /// Deletes every default route on every virtual router of a mesh.
    ///
    /// All pages are read before the first delete, so deleting never shifts
    /// a page that is still to be read. Returns the number of routes deleted.
    ///
    /// # Errors
    ///
    /// Returns the first list or delete error.
    pub async fn delete_all_default_routes(&self, mesh_name: &str) -> Result<usize> {
        let api = self.api.as_ref();

        let routers = Paginator::virtual_routers(api, mesh_name).collect_all().await?;

        let mut stale: Vec<RouteRef> = Vec::new();
        for router in &routers {
            let routes = Paginator::routes(api, mesh_name, &router.virtual_router_name)
                .collect_all()
                .await?;
            stale.extend(routes.into_iter().filter(|r| r.route_name == DEFAULT_ROUTE_NAME));
        }

        let mut deleted = 0;
        for route in &stale {
            match api
                .delete_route(mesh_name, &route.virtual_router_name, &route.route_name)
                .await
            {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {
                    debug!(
                        "Default route on {} already gone",
                        route.virtual_router_name
                    );
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            "Deleted {deleted} default routes across {} routers in mesh {mesh_name}",
            routers.len()
        );
        Ok(deleted)
    }
}
