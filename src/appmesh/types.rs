//! App Mesh API types and data structures.
//!
//! These mirror the App Mesh `2019-01-25` resource shapes and serialize to
//! its camelCase JSON, which is what `plan --output json` prints. Only the
//! fields the enforcer writes or compares are modeled. Fields it never
//! writes are carried as an opaque rendering of the observed value.

use serde::{Deserialize, Serialize};

/// A virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceData {
    /// Mesh the resource lives in.
    pub mesh_name: String,
    /// Virtual service name.
    pub virtual_service_name: String,
    /// Virtual service spec.
    pub spec: VirtualServiceSpec,
    /// Server-side metadata, present on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
}

/// Virtual service spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    /// Where traffic for the service goes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<VirtualServiceProvider>,
}

/// Virtual service provider: a router or a single node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceProvider {
    /// Virtual router provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_router: Option<VirtualRouterServiceProvider>,
    /// Virtual node provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_node: Option<VirtualNodeServiceProvider>,
}

/// Router target of a virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterServiceProvider {
    /// Router name.
    pub virtual_router_name: String,
}

/// Node target of a virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNodeServiceProvider {
    /// Node name.
    pub virtual_node_name: String,
}

/// A virtual router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterData {
    /// Mesh the resource lives in.
    pub mesh_name: String,
    /// Virtual router name.
    pub virtual_router_name: String,
    /// Virtual router spec.
    pub spec: VirtualRouterSpec,
    /// Server-side metadata, present on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
}

/// Virtual router spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterSpec {
    /// Router listeners.
    #[serde(default)]
    pub listeners: Vec<Listener>,
}

/// A listener on a router or node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    /// Port and protocol.
    pub port_mapping: PortMapping,
}

/// Port and protocol pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port number.
    pub port: u16,
    /// Protocol.
    pub protocol: String,
}

/// A route on a virtual router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    /// Mesh the resource lives in.
    pub mesh_name: String,
    /// Router the route belongs to.
    pub virtual_router_name: String,
    /// Route name.
    pub route_name: String,
    /// Route spec.
    pub spec: RouteSpec,
    /// Server-side metadata, present on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
}

/// Route spec. Exactly one route type is expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Priority, 0 (highest) to 1000 (lowest).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// HTTP route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_route: Option<HttpRoute>,
    /// HTTP/2 route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http2_route: Option<HttpRoute>,
    /// TCP route.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_route: Option<TcpRoute>,
    /// gRPC route, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc_route: Option<String>,
}

/// HTTP or HTTP/2 route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    /// Request match.
    #[serde(rename = "match")]
    pub route_match: HttpRouteMatch,
    /// Route action.
    pub action: RouteAction,
    /// Retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<HttpRetryPolicy>,
}

/// HTTP request match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteMatch {
    /// Path prefix.
    pub prefix: String,
    /// HTTP method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// URL scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Header matchers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<HttpRouteHeader>>,
}

/// Header matcher, kept opaque beyond the header name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteHeader {
    /// Header name.
    pub name: String,
    /// Whether to invert the match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invert: Option<bool>,
    /// Match expression, kept opaque.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub header_match: Option<String>,
}

/// HTTP retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRetryPolicy {
    /// Maximum retries.
    pub max_retries: i64,
    /// Timeout per retry, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_retry_timeout: Option<String>,
    /// HTTP retry events.
    #[serde(default)]
    pub http_retry_events: Vec<String>,
    /// TCP retry events.
    #[serde(default)]
    pub tcp_retry_events: Vec<String>,
}

/// TCP route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpRoute {
    /// Route action.
    pub action: RouteAction,
}

/// Weighted load-balancing action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAction {
    /// Weighted targets.
    #[serde(default)]
    pub weighted_targets: Vec<WeightedTarget>,
}

/// A (virtual node, weight) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedTarget {
    /// Target virtual node name.
    pub virtual_node: String,
    /// Relative weight.
    pub weight: u32,
}

/// A virtual node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNodeData {
    /// Mesh the resource lives in.
    pub mesh_name: String,
    /// Virtual node name.
    pub virtual_node_name: String,
    /// Virtual node spec.
    pub spec: VirtualNodeSpec,
    /// Server-side metadata, present on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
}

/// Virtual node spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNodeSpec {
    /// Node listeners.
    #[serde(default)]
    pub listeners: Vec<Listener>,
    /// Virtual services this node may call.
    #[serde(default)]
    pub backends: Vec<Backend>,
    /// How peers find this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_discovery: Option<ServiceDiscovery>,
}

/// A backend of a virtual node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    /// Virtual service backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_service: Option<VirtualServiceBackend>,
}

/// Virtual service reference inside a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceBackend {
    /// Virtual service name.
    pub virtual_service_name: String,
}

/// Service discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDiscovery {
    /// DNS discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<DnsServiceDiscovery>,
}

/// DNS service discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsServiceDiscovery {
    /// Hostname to resolve.
    pub hostname: String,
}

/// Metadata App Mesh attaches to every resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    /// Resource ARN.
    #[serde(default)]
    pub arn: String,
    /// Resource version.
    #[serde(default)]
    pub version: i64,
}

/// Summary entry returned when listing virtual routers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualRouterRef {
    /// Mesh name.
    pub mesh_name: String,
    /// Router name.
    pub virtual_router_name: String,
}

/// Summary entry returned when listing routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRef {
    /// Mesh name.
    pub mesh_name: String,
    /// Router name.
    pub virtual_router_name: String,
    /// Route name.
    pub route_name: String,
}

/// One page of a paginated list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation token; `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page.
    #[must_use]
    pub const fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    /// Creates the last page of a sequence.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}
