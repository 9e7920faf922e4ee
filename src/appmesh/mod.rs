//! AWS App Mesh provider module.
//!
//! This module provides:
//! - Wire types and deterministic naming for App Mesh resources
//! - Translation of topology entities into desired resources
//! - Semantic equality between desired and observed resources
//! - An `aws-sdk-appmesh` client and an idempotent ensure layer on top of it
//! - Per-mesh reconciliation and the App Mesh enforcer

mod types;
pub mod naming;
mod translator;
mod matcher;
mod api;
mod credentials;
mod convert;
mod sdk;
mod client;
mod desired;
mod reconciler;
mod enforcer;

pub use types::{
    Backend, DnsServiceDiscovery, HttpRetryPolicy, HttpRoute, HttpRouteHeader, HttpRouteMatch,
    Listener, Page, PortMapping, ResourceMetadata, RouteAction, RouteData, RouteRef, RouteSpec,
    ServiceDiscovery, TcpRoute, VirtualNodeData, VirtualNodeServiceProvider, VirtualNodeSpec,
    VirtualRouterData, VirtualRouterRef, VirtualRouterServiceProvider, VirtualRouterSpec,
    VirtualServiceBackend, VirtualServiceData, VirtualServiceProvider, VirtualServiceSpec,
    WeightedTarget,
};
pub use translator::{AppMeshTranslator, MAX_WEIGHTED_TARGETS};
pub use matcher::{routes_equal, virtual_nodes_equal, virtual_routers_equal, virtual_services_equal};
pub use api::{AppMeshApi, PageFuture, Paginator};
pub use credentials::{AccountCredentials, CredentialResolver, StaticCredentialResolver};
pub use sdk::{
    AppMeshApiFactory, ClientSettings, DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE,
    DEFAULT_TIMEOUT_SECS, SdkAppMeshApi, SdkAppMeshApiFactory,
};
pub use client::{AppMeshClient, EnsureOutcome};
pub use desired::DesiredResources;
pub use reconciler::{AppMeshReconciler, ReconcileSummary};
pub use enforcer::AppMeshEnforcer;
