//! Conversions between the enforcer's App Mesh types and `aws-sdk-appmesh`.
//!
//! Desired resources go out through the SDK builders. Observed resources come
//! back into the enforcer's own types so the matcher never sees SDK shapes.

use aws_sdk_appmesh::error::BuildError;
use aws_sdk_appmesh::types as sdk;

use crate::error::{EnforcerError, ProviderError, Result};

use super::types::{
    Backend, DnsServiceDiscovery, HttpRetryPolicy, HttpRoute, HttpRouteHeader, HttpRouteMatch,
    Listener, PortMapping, ResourceMetadata, RouteAction, RouteData, RouteRef, RouteSpec,
    ServiceDiscovery, TcpRoute, VirtualNodeData, VirtualNodeServiceProvider, VirtualNodeSpec,
    VirtualRouterData, VirtualRouterRef, VirtualRouterServiceProvider, VirtualRouterSpec,
    VirtualServiceBackend, VirtualServiceData, VirtualServiceProvider, VirtualServiceSpec,
    WeightedTarget,
};

fn invalid_request(message: impl Into<String>) -> EnforcerError {
    ProviderError::InvalidRequest {
        message: message.into(),
    }
    .into()
}

fn invalid_response(message: impl Into<String>) -> EnforcerError {
    ProviderError::InvalidResponse {
        message: message.into(),
    }
    .into()
}

#[allow(clippy::needless_pass_by_value)]
fn build_error(e: BuildError) -> EnforcerError {
    invalid_request(e.to_string())
}

// ============================================================================
// Outgoing
// ============================================================================

/// Converts a virtual service spec. A router provider wins over a node.
pub(super) fn virtual_service_spec(spec: &VirtualServiceSpec) -> Result<sdk::VirtualServiceSpec> {
    let provider = match &spec.provider {
        Some(VirtualServiceProvider {
            virtual_router: Some(router),
            ..
        }) => Some(sdk::VirtualServiceProvider::VirtualRouter(
            sdk::VirtualRouterServiceProvider::builder()
                .virtual_router_name(&router.virtual_router_name)
                .build()
                .map_err(build_error)?,
        )),
        Some(VirtualServiceProvider {
            virtual_node: Some(node),
            ..
        }) => Some(sdk::VirtualServiceProvider::VirtualNode(
            sdk::VirtualNodeServiceProvider::builder()
                .virtual_node_name(&node.virtual_node_name)
                .build()
                .map_err(build_error)?,
        )),
        _ => None,
    };

    Ok(sdk::VirtualServiceSpec::builder().set_provider(provider).build())
}

fn port_mapping(mapping: &PortMapping) -> Result<sdk::PortMapping> {
    sdk::PortMapping::builder()
        .port(i32::from(mapping.port))
        .protocol(sdk::PortProtocol::from(mapping.protocol.to_lowercase().as_str()))
        .build()
        .map_err(build_error)
}

/// Converts a virtual router spec.
pub(super) fn virtual_router_spec(spec: &VirtualRouterSpec) -> Result<sdk::VirtualRouterSpec> {
    let listeners = spec
        .listeners
        .iter()
        .map(|l| {
            Ok(sdk::VirtualRouterListener::builder()
                .port_mapping(port_mapping(&l.port_mapping)?)
                .build())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(sdk::VirtualRouterSpec::builder()
        .set_listeners(Some(listeners))
        .build())
}

fn weighted_targets(targets: &[WeightedTarget]) -> Result<Vec<sdk::WeightedTarget>> {
    targets
        .iter()
        .map(|t| {
            let weight = i32::try_from(t.weight)
                .map_err(|_| invalid_request(format!("Weight {} is out of range", t.weight)))?;
            sdk::WeightedTarget::builder()
                .virtual_node(&t.virtual_node)
                .weight(weight)
                .build()
                .map_err(build_error)
        })
        .collect()
}

fn http_route(route: &HttpRoute) -> Result<sdk::HttpRoute> {
    if route.route_match.headers.is_some() || route.retry_policy.is_some() {
        return Err(invalid_request(
            "Header matchers and retry policies are never written",
        ));
    }

    let mut route_match = sdk::HttpRouteMatch::builder().prefix(&route.route_match.prefix);
    if let Some(method) = &route.route_match.method {
        route_match = route_match.method(sdk::HttpMethod::from(method.as_str()));
    }
    if let Some(scheme) = &route.route_match.scheme {
        route_match = route_match.scheme(sdk::HttpScheme::from(scheme.as_str()));
    }

    let action = sdk::HttpRouteAction::builder()
        .set_weighted_targets(Some(weighted_targets(&route.action.weighted_targets)?))
        .build()
        .map_err(build_error)?;

    Ok(sdk::HttpRoute::builder()
        .r#match(route_match.build())
        .action(action)
        .build())
}

fn tcp_route(route: &TcpRoute) -> Result<sdk::TcpRoute> {
    let action = sdk::TcpRouteAction::builder()
        .set_weighted_targets(Some(weighted_targets(&route.action.weighted_targets)?))
        .build()
        .map_err(build_error)?;

    Ok(sdk::TcpRoute::builder().action(action).build())
}

/// Converts a route spec.
pub(super) fn route_spec(spec: &RouteSpec) -> Result<sdk::RouteSpec> {
    if spec.grpc_route.is_some() {
        return Err(invalid_request("gRPC routes are never written"));
    }

    Ok(sdk::RouteSpec::builder()
        .set_priority(spec.priority)
        .set_http_route(spec.http_route.as_ref().map(http_route).transpose()?)
        .set_http2_route(spec.http2_route.as_ref().map(http_route).transpose()?)
        .set_tcp_route(spec.tcp_route.as_ref().map(tcp_route).transpose()?)
        .build())
}

/// Converts a virtual node spec.
pub(super) fn virtual_node_spec(spec: &VirtualNodeSpec) -> Result<sdk::VirtualNodeSpec> {
    let listeners = spec
        .listeners
        .iter()
        .map(|l| {
            Ok(sdk::Listener::builder()
                .port_mapping(port_mapping(&l.port_mapping)?)
                .build())
        })
        .collect::<Result<Vec<_>>>()?;

    let backends = spec
        .backends
        .iter()
        .map(|b| {
            let service = b
                .virtual_service
                .as_ref()
                .ok_or_else(|| invalid_request("Backend without a virtual service"))?;
            Ok(sdk::Backend::VirtualService(
                sdk::VirtualServiceBackend::builder()
                    .virtual_service_name(&service.virtual_service_name)
                    .build()
                    .map_err(build_error)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let service_discovery = spec
        .service_discovery
        .as_ref()
        .and_then(|sd| sd.dns.as_ref())
        .map(|dns| {
            sdk::DnsServiceDiscovery::builder()
                .hostname(&dns.hostname)
                .build()
                .map(sdk::ServiceDiscovery::Dns)
                .map_err(build_error)
        })
        .transpose()?;

    Ok(sdk::VirtualNodeSpec::builder()
        .set_listeners(Some(listeners))
        .set_backends(Some(backends))
        .set_service_discovery(service_discovery)
        .build())
}

// ============================================================================
// Incoming
// ============================================================================

fn metadata(metadata: Option<&sdk::ResourceMetadata>) -> Option<ResourceMetadata> {
    metadata.map(|m| ResourceMetadata {
        arn: m.arn().to_string(),
        version: m.version(),
    })
}

fn listener(mapping: Option<&sdk::PortMapping>) -> Result<Listener> {
    let mapping = mapping.ok_or_else(|| invalid_response("Listener without a port mapping"))?;
    let port = u16::try_from(mapping.port())
        .map_err(|_| invalid_response(format!("Port {} is out of range", mapping.port())))?;

    Ok(Listener {
        port_mapping: PortMapping {
            port,
            protocol: mapping.protocol().as_str().to_string(),
        },
    })
}

fn route_action(targets: &[sdk::WeightedTarget]) -> RouteAction {
    RouteAction {
        weighted_targets: targets
            .iter()
            .map(|t| WeightedTarget {
                virtual_node: t.virtual_node().to_string(),
                // Negative weights are rejected by the service.
                weight: u32::try_from(t.weight()).unwrap_or_default(),
            })
            .collect(),
    }
}

fn http_route_from_sdk(route: &sdk::HttpRoute) -> HttpRoute {
    let route_match = route.r#match().map_or_else(HttpRouteMatch::default, |m| {
        let headers: Vec<HttpRouteHeader> = m
            .headers()
            .iter()
            .map(|h| HttpRouteHeader {
                name: h.name().to_string(),
                invert: h.invert(),
                header_match: h.r#match().map(|hm| format!("{hm:?}")),
            })
            .collect();

        HttpRouteMatch {
            prefix: m.prefix().unwrap_or_default().to_string(),
            method: m.method().map(|x| x.as_str().to_string()),
            scheme: m.scheme().map(|x| x.as_str().to_string()),
            headers: (!headers.is_empty()).then_some(headers),
        }
    });

    let retry_policy = route.retry_policy().map(|p| HttpRetryPolicy {
        max_retries: p.max_retries(),
        per_retry_timeout: p.per_retry_timeout().map(|d| format!("{d:?}")),
        http_retry_events: p.http_retry_events().to_vec(),
        tcp_retry_events: p
            .tcp_retry_events()
            .iter()
            .map(|e| e.as_str().to_string())
            .collect(),
    });

    HttpRoute {
        route_match,
        action: route
            .action()
            .map_or_else(RouteAction::default, |a| route_action(a.weighted_targets())),
        retry_policy,
    }
}

/// Converts an observed virtual service.
pub(super) fn virtual_service_from_sdk(data: &sdk::VirtualServiceData) -> Result<VirtualServiceData> {
    let provider = data.spec().and_then(sdk::VirtualServiceSpec::provider).map(|p| match p {
        sdk::VirtualServiceProvider::VirtualRouter(r) => VirtualServiceProvider {
            virtual_router: Some(VirtualRouterServiceProvider {
                virtual_router_name: r.virtual_router_name().to_string(),
            }),
            virtual_node: None,
        },
        sdk::VirtualServiceProvider::VirtualNode(n) => VirtualServiceProvider {
            virtual_router: None,
            virtual_node: Some(VirtualNodeServiceProvider {
                virtual_node_name: n.virtual_node_name().to_string(),
            }),
        },
        _ => VirtualServiceProvider::default(),
    });

    Ok(VirtualServiceData {
        mesh_name: data.mesh_name().to_string(),
        virtual_service_name: data.virtual_service_name().to_string(),
        spec: VirtualServiceSpec { provider },
        metadata: metadata(data.metadata()),
    })
}

/// Converts an observed virtual router.
pub(super) fn virtual_router_from_sdk(data: &sdk::VirtualRouterData) -> Result<VirtualRouterData> {
    let listeners = data
        .spec()
        .map(sdk::VirtualRouterSpec::listeners)
        .unwrap_or_default()
        .iter()
        .map(|l| listener(l.port_mapping()))
        .collect::<Result<Vec<_>>>()?;

    Ok(VirtualRouterData {
        mesh_name: data.mesh_name().to_string(),
        virtual_router_name: data.virtual_router_name().to_string(),
        spec: VirtualRouterSpec { listeners },
        metadata: metadata(data.metadata()),
    })
}

/// Converts an observed route.
pub(super) fn route_from_sdk(data: &sdk::RouteData) -> Result<RouteData> {
    let spec = data.spec().map_or_else(RouteSpec::default, |s| RouteSpec {
        priority: s.priority(),
        http_route: s.http_route().map(http_route_from_sdk),
        http2_route: s.http2_route().map(http_route_from_sdk),
        tcp_route: s.tcp_route().map(|t| TcpRoute {
            action: t
                .action()
                .map_or_else(RouteAction::default, |a| route_action(a.weighted_targets())),
        }),
        grpc_route: s.grpc_route().map(|g| format!("{g:?}")),
    });

    Ok(RouteData {
        mesh_name: data.mesh_name().to_string(),
        virtual_router_name: data.virtual_router_name().to_string(),
        route_name: data.route_name().to_string(),
        spec,
        metadata: metadata(data.metadata()),
    })
}

/// Converts an observed virtual node.
pub(super) fn virtual_node_from_sdk(data: &sdk::VirtualNodeData) -> Result<VirtualNodeData> {
    let Some(spec) = data.spec() else {
        return Ok(VirtualNodeData {
            mesh_name: data.mesh_name().to_string(),
            virtual_node_name: data.virtual_node_name().to_string(),
            spec: VirtualNodeSpec::default(),
            metadata: metadata(data.metadata()),
        });
    };

    let listeners = spec
        .listeners()
        .iter()
        .map(|l| listener(l.port_mapping()))
        .collect::<Result<Vec<_>>>()?;

    let backends = spec
        .backends()
        .iter()
        .map(|b| Backend {
            virtual_service: b.as_virtual_service().ok().map(|vs| VirtualServiceBackend {
                virtual_service_name: vs.virtual_service_name().to_string(),
            }),
        })
        .collect();

    // Cloud Map discovery is observed as discovery without DNS.
    let service_discovery = spec.service_discovery().map(|sd| ServiceDiscovery {
        dns: sd.as_dns().ok().map(|dns| DnsServiceDiscovery {
            hostname: dns.hostname().to_string(),
        }),
    });

    Ok(VirtualNodeData {
        mesh_name: data.mesh_name().to_string(),
        virtual_node_name: data.virtual_node_name().to_string(),
        spec: VirtualNodeSpec {
            listeners,
            backends,
            service_discovery,
        },
        metadata: metadata(data.metadata()),
    })
}

/// Converts a virtual router list entry.
pub(super) fn virtual_router_ref(r: &sdk::VirtualRouterRef) -> VirtualRouterRef {
    VirtualRouterRef {
        mesh_name: r.mesh_name().to_string(),
        virtual_router_name: r.virtual_router_name().to_string(),
    }
}

/// Converts a route list entry.
pub(super) fn route_ref(r: &sdk::RouteRef) -> RouteRef {
    RouteRef {
        mesh_name: r.mesh_name().to_string(),
        virtual_router_name: r.virtual_router_name().to_string(),
        route_name: r.route_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_route_spec(targets: Vec<WeightedTarget>) -> RouteSpec {
        RouteSpec {
            priority: Some(1000),
            http_route: Some(HttpRoute {
                route_match: HttpRouteMatch {
                    prefix: String::from("/"),
                    ..HttpRouteMatch::default()
                },
                action: RouteAction {
                    weighted_targets: targets,
                },
                retry_policy: None,
            }),
            ..RouteSpec::default()
        }
    }

    #[test]
    fn test_route_spec_survives_the_sdk_shape() {
        let spec = http_route_spec(vec![WeightedTarget {
            virtual_node: String::from("reviews-v1.bookinfo"),
            weight: 1,
        }]);

        let outgoing = route_spec(&spec).expect("convert route spec");
        let data = sdk::RouteData::builder()
            .mesh_name("prod")
            .virtual_router_name("reviews.bookinfo")
            .route_name("default")
            .spec(outgoing)
            .build()
            .expect("route data");

        let observed = route_from_sdk(&data).expect("convert back");
        assert_eq!(observed.spec, spec);
        assert_eq!(observed.route_name, "default");
    }

    #[test]
    fn test_protocol_is_sent_lowercase() {
        let mapping = port_mapping(&PortMapping {
            port: 9080,
            protocol: String::from("HTTP"),
        })
        .expect("port mapping");

        assert_eq!(mapping.protocol(), &sdk::PortProtocol::Http);
        assert_eq!(mapping.port(), 9080);
    }

    #[test]
    fn test_router_provider_wins_over_node() {
        let spec = VirtualServiceSpec {
            provider: Some(VirtualServiceProvider {
                virtual_router: Some(VirtualRouterServiceProvider {
                    virtual_router_name: String::from("reviews.bookinfo"),
                }),
                virtual_node: Some(VirtualNodeServiceProvider {
                    virtual_node_name: String::from("reviews-v1.bookinfo"),
                }),
            }),
        };

        let outgoing = virtual_service_spec(&spec).expect("convert");
        assert!(matches!(
            outgoing.provider(),
            Some(sdk::VirtualServiceProvider::VirtualRouter(_))
        ));
    }

    #[test]
    fn test_header_matchers_are_not_written() {
        let mut spec = http_route_spec(vec![]);
        if let Some(http) = spec.http_route.as_mut() {
            http.route_match.headers = Some(vec![HttpRouteHeader {
                name: String::from("x-canary"),
                invert: None,
                header_match: None,
            }]);
        }

        assert!(route_spec(&spec).is_err());
    }

    #[test]
    fn test_cloud_map_node_has_no_dns_hostname() {
        let spec = sdk::VirtualNodeSpec::builder()
            .service_discovery(sdk::ServiceDiscovery::AwsCloudMap(
                sdk::AwsCloudMapServiceDiscovery::builder()
                    .namespace_name("ns")
                    .service_name("svc")
                    .build()
                    .expect("cloud map"),
            ))
            .build();
        let data = sdk::VirtualNodeData::builder()
            .mesh_name("prod")
            .virtual_node_name("web.default")
            .spec(spec)
            .build()
            .expect("node data");

        let node = virtual_node_from_sdk(&data).expect("convert");
        let discovery = node.spec.service_discovery.expect("discovery");
        assert!(discovery.dns.is_none());
    }
}
