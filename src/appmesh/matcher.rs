//! Structural equality between desired and observed App Mesh resources.
//!
//! These comparisons are the only gate for issuing an update. They are
//! symmetric and ignore the order of every list they compare. Fields the
//! enforcer never writes (header matchers, retry policies, gRPC routes) are
//! not compared: their presence on either side makes resources unequal.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{
    HttpRoute, Listener, RouteData, RouteSpec, VirtualNodeData, VirtualRouterData,
    VirtualServiceData, WeightedTarget,
};

/// Returns true if two routes are equivalent.
#[must_use]
pub fn routes_equal(a: &RouteData, b: &RouteData) -> bool {
    if a.route_name != b.route_name
        || a.mesh_name != b.mesh_name
        || a.virtual_router_name != b.virtual_router_name
        || a.spec.priority != b.spec.priority
    {
        return false;
    }

    if has_unmodeled_fields(&a.spec) || has_unmodeled_fields(&b.spec) {
        return false;
    }

    match (
        (&a.spec.http_route, &a.spec.http2_route, &a.spec.tcp_route),
        (&b.spec.http_route, &b.spec.http2_route, &b.spec.tcp_route),
    ) {
        ((Some(x), None, None), (Some(y), None, None))
        | ((None, Some(x), None), (None, Some(y), None)) => http_routes_equal(x, y),
        ((None, None, Some(x)), (None, None, Some(y))) => {
            target_weights(&x.action.weighted_targets) == target_weights(&y.action.weighted_targets)
        }
        ((None, None, None), (None, None, None)) => true,
        _ => false,
    }
}

/// Returns true if two virtual nodes are equivalent.
#[must_use]
pub fn virtual_nodes_equal(a: &VirtualNodeData, b: &VirtualNodeData) -> bool {
    a.virtual_node_name == b.virtual_node_name
        && a.mesh_name == b.mesh_name
        && dns_hostname(a) == dns_hostname(b)
        && port_protocols(&a.spec.listeners) == port_protocols(&b.spec.listeners)
        && backend_names(a) == backend_names(b)
}

/// Returns true if two virtual services are equivalent.
#[must_use]
pub fn virtual_services_equal(a: &VirtualServiceData, b: &VirtualServiceData) -> bool {
    a.virtual_service_name == b.virtual_service_name
        && a.mesh_name == b.mesh_name
        && a.spec.provider == b.spec.provider
}

/// Returns true if two virtual routers are equivalent.
#[must_use]
pub fn virtual_routers_equal(a: &VirtualRouterData, b: &VirtualRouterData) -> bool {
    a.virtual_router_name == b.virtual_router_name
        && a.mesh_name == b.mesh_name
        && port_protocols(&a.spec.listeners) == port_protocols(&b.spec.listeners)
}

fn has_unmodeled_fields(spec: &RouteSpec) -> bool {
    let http_extras = |route: &Option<HttpRoute>| {
        route
            .as_ref()
            .is_some_and(|r| r.route_match.headers.is_some() || r.retry_policy.is_some())
    };

    spec.grpc_route.is_some() || http_extras(&spec.http_route) || http_extras(&spec.http2_route)
}

fn http_routes_equal(a: &HttpRoute, b: &HttpRoute) -> bool {
    a.route_match.prefix == b.route_match.prefix
        && a.route_match.method == b.route_match.method
        && a.route_match.scheme == b.route_match.scheme
        && target_weights(&a.action.weighted_targets) == target_weights(&b.action.weighted_targets)
}

fn target_weights(targets: &[WeightedTarget]) -> BTreeMap<&str, u32> {
    targets
        .iter()
        .map(|t| (t.virtual_node.as_str(), t.weight))
        .collect()
}

fn port_protocols(listeners: &[Listener]) -> BTreeMap<u16, String> {
    listeners
        .iter()
        .map(|l| (l.port_mapping.port, l.port_mapping.protocol.to_lowercase()))
        .collect()
}

fn backend_names(node: &VirtualNodeData) -> BTreeSet<&str> {
    node.spec
        .backends
        .iter()
        .filter_map(|b| b.virtual_service.as_ref())
        .map(|vs| vs.virtual_service_name.as_str())
        .collect()
}

fn dns_hostname(node: &VirtualNodeData) -> Option<&str> {
    node.spec
        .service_discovery
        .as_ref()
        .and_then(|d| d.dns.as_ref())
        .map(|d| d.hostname.as_str())
}
