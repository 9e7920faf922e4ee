//! Topology to App Mesh resource translation.
//!
//! Translation is pure: the same entities always produce byte-identical
//! resources.

use std::collections::BTreeSet;

use crate::error::{Result, TranslationError};
use crate::model::{MeshService, MeshWorkload, ObjectRef};

use super::naming::{virtual_node_name, virtual_router_name, virtual_service_name};
use super::types::{
    Backend, DnsServiceDiscovery, HttpRoute, HttpRouteMatch, Listener, PortMapping, RouteAction,
    RouteData, RouteSpec, ServiceDiscovery, VirtualNodeData, VirtualNodeSpec, VirtualRouterData,
    VirtualRouterServiceProvider, VirtualRouterSpec, VirtualServiceBackend, VirtualServiceData,
    VirtualServiceProvider, VirtualServiceSpec, WeightedTarget,
};

/// Maximum weighted targets App Mesh accepts on one route.
pub const MAX_WEIGHTED_TARGETS: usize = 10;

/// Path prefix matching every request.
const CATCH_ALL_PREFIX: &str = "/";

/// Builds desired App Mesh resources from mesh services and workloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppMeshTranslator;

impl AppMeshTranslator {
    /// Creates a new translator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the virtual service of a mesh service, routed through the
    /// service's virtual router.
    #[must_use]
    pub fn build_virtual_service(&self, mesh_name: &str, service: &MeshService) -> VirtualServiceData {
        VirtualServiceData {
            mesh_name: mesh_name.to_string(),
            virtual_service_name: virtual_service_name(&service.metadata),
            spec: VirtualServiceSpec {
                provider: Some(VirtualServiceProvider {
                    virtual_router: Some(VirtualRouterServiceProvider {
                        virtual_router_name: virtual_router_name(&service.metadata),
                    }),
                    virtual_node: None,
                }),
            },
            metadata: None,
        }
    }

    /// Builds the virtual router of a mesh service, one listener per port.
    #[must_use]
    pub fn build_virtual_router(&self, mesh_name: &str, service: &MeshService) -> VirtualRouterData {
        let listeners = service
            .ports
            .iter()
            .map(|p| Listener {
                port_mapping: PortMapping {
                    port: p.port,
                    protocol: p.protocol.clone(),
                },
            })
            .collect();

        VirtualRouterData {
            mesh_name: mesh_name.to_string(),
            virtual_router_name: virtual_router_name(&service.metadata),
            spec: VirtualRouterSpec { listeners },
            metadata: None,
        }
    }

    /// Builds a catch-all route spreading traffic evenly over `workloads`.
    ///
    /// # Errors
    ///
    /// Returns an error if there are more workloads than a route can target.
    pub fn build_route(
        &self,
        mesh_name: &str,
        route_name: &str,
        priority: i32,
        service: &MeshService,
        workloads: &[&MeshWorkload],
    ) -> Result<RouteData> {
        if workloads.len() > MAX_WEIGHTED_TARGETS {
            return Err(TranslationError::ExceededMaximumWorkloads {
                service: service.metadata.to_string(),
                count: workloads.len(),
                limit: MAX_WEIGHTED_TARGETS,
            }
            .into());
        }

        let weighted_targets = workloads
            .iter()
            .map(|w| WeightedTarget {
                virtual_node: virtual_node_name(&w.metadata),
                weight: 1,
            })
            .collect();

        Ok(RouteData {
            mesh_name: mesh_name.to_string(),
            virtual_router_name: virtual_router_name(&service.metadata),
            route_name: route_name.to_string(),
            spec: RouteSpec {
                priority: Some(priority),
                http_route: Some(HttpRoute {
                    route_match: HttpRouteMatch {
                        prefix: CATCH_ALL_PREFIX.to_string(),
                        ..HttpRouteMatch::default()
                    },
                    action: RouteAction { weighted_targets },
                    retry_policy: None,
                }),
                ..RouteSpec::default()
            },
            metadata: None,
        })
    }

    /// Builds the virtual node of a workload.
    ///
    /// DNS discovery is only set when `dns_service` is given; a workload that
    /// backs no service is not addressable.
    #[must_use]
    pub fn build_virtual_node(
        &self,
        mesh_name: &str,
        workload: &MeshWorkload,
        dns_service: Option<&MeshService>,
        upstream_services: &BTreeSet<ObjectRef>,
    ) -> VirtualNodeData {
        let listeners = workload
            .ports
            .iter()
            .map(|p| Listener {
                port_mapping: PortMapping {
                    port: p.port,
                    protocol: p.protocol.clone(),
                },
            })
            .collect();

        let backends = upstream_services
            .iter()
            .map(|s| Backend {
                virtual_service: Some(VirtualServiceBackend {
                    virtual_service_name: virtual_service_name(s),
                }),
            })
            .collect();

        let service_discovery = dns_service.map(|s| ServiceDiscovery {
            dns: Some(DnsServiceDiscovery {
                hostname: s.local_dns_name(),
            }),
        });

        VirtualNodeData {
            mesh_name: mesh_name.to_string(),
            virtual_node_name: virtual_node_name(&workload.metadata),
            spec: VirtualNodeSpec {
                listeners,
                backends,
                service_discovery,
            },
            metadata: None,
        }
    }
}
