//! Desired App Mesh resources for one mesh and one cycle.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::Result;
use crate::model::ObjectRef;
use crate::topology::TopologySnapshot;

use super::naming::{DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_PRIORITY};
use super::translator::AppMeshTranslator;
use super::types::{RouteData, VirtualNodeData, VirtualRouterData, VirtualServiceData};

/// Everything the enforcer wants to exist in one App Mesh mesh.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredResources {
    /// App Mesh mesh name.
    pub mesh_name: String,
    /// Whether the set was built in enforced mode.
    pub enforced: bool,
    /// One router per service.
    pub virtual_routers: Vec<VirtualRouterData>,
    /// One virtual service per service.
    pub virtual_services: Vec<VirtualServiceData>,
    /// One default route per service with backing workloads.
    pub routes: Vec<RouteData>,
    /// One node per workload.
    pub virtual_nodes: Vec<VirtualNodeData>,
    /// Routes that could not be translated, one entry per service.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub route_failures: Vec<String>,
}

impl DesiredResources {
    /// Translates a snapshot into desired resources.
    ///
    /// In enforced mode only services and workloads covered by a policy are
    /// translated, and routes only target covered workloads. In open mode
    /// every workload may reach every service of the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if a policy selector cannot be evaluated.
    pub fn build(
        translator: &AppMeshTranslator,
        snapshot: &TopologySnapshot,
        mesh_name: &str,
        enforced: bool,
    ) -> Result<Self> {
        let mut graph = snapshot.service_workload_graph();

        let upstreams = if enforced {
            let services = snapshot.services_with_policy()?;
            let (workloads, upstreams) = snapshot.workloads_with_policy_and_upstreams()?;
            debug!(
                "Mesh {}: {} of {} services and {} of {} workloads covered by policy",
                snapshot.mesh(),
                services.len(),
                graph.service_count(),
                workloads.len(),
                graph.workload_count()
            );
            graph.retain(&services, &workloads);
            upstreams
        } else {
            snapshot.all_upstream_services()
        };

        let mut desired = Self {
            mesh_name: mesh_name.to_string(),
            enforced,
            ..Self::default()
        };

        for service in graph.services() {
            desired
                .virtual_routers
                .push(translator.build_virtual_router(mesh_name, service));
            desired
                .virtual_services
                .push(translator.build_virtual_service(mesh_name, service));

            let backing = graph.backing_workloads(&service.metadata);
            if backing.is_empty() {
                debug!("Service {} has no backing workloads, no route", service.metadata);
                continue;
            }
            match translator.build_route(
                mesh_name,
                DEFAULT_ROUTE_NAME,
                DEFAULT_ROUTE_PRIORITY,
                service,
                &backing,
            ) {
                Ok(route) => desired.routes.push(route),
                Err(e) => {
                    debug!("No route for service {}: {e}", service.metadata);
                    desired.route_failures.push(e.to_string());
                }
            }
        }

        let no_upstreams = BTreeSet::<ObjectRef>::new();
        for workload in graph.workloads() {
            let dns_service = graph.backed_services(&workload.metadata).first().copied();
            let upstream_services = upstreams.get(&workload.metadata).unwrap_or(&no_upstreams);

            desired.virtual_nodes.push(translator.build_virtual_node(
                mesh_name,
                workload,
                dns_service,
                upstream_services,
            ));
        }

        Ok(desired)
    }

    /// Total number of resources in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.virtual_routers.len()
            + self.virtual_services.len()
            + self.routes.len()
            + self.virtual_nodes.len()
    }

    /// Returns true if nothing is desired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
