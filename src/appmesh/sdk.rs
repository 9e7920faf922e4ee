//! App Mesh client built on `aws-sdk-appmesh`.
//!
//! Request signing, retries with backoff and timeouts are the SDK's. This
//! module maps SDK errors onto `ProviderError` and builds one client per
//! mesh account and region.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{Region, SdkConfig};
use aws_sdk_appmesh::Client;
use aws_sdk_appmesh::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_appmesh::operation::delete_route::DeleteRouteError;
use aws_sdk_appmesh::operation::describe_route::DescribeRouteError;
use aws_sdk_appmesh::operation::describe_virtual_node::DescribeVirtualNodeError;
use aws_sdk_appmesh::operation::describe_virtual_router::DescribeVirtualRouterError;
use aws_sdk_appmesh::operation::describe_virtual_service::DescribeVirtualServiceError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{EnforcerError, ProviderError, Result};
use crate::model::AppMeshSpec;

use super::api::AppMeshApi;
use super::convert;
use super::credentials::AccountCredentials;
use super::types::{
    Page, RouteData, RouteRef, VirtualNodeData, VirtualRouterData, VirtualRouterRef,
    VirtualServiceData,
};

/// Default operation timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default list page size (App Mesh maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default attempts per call, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Connection settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Endpoint override, e.g. a local emulator. `None` uses the regional endpoint.
    pub endpoint: Option<String>,
    /// Operation timeout in seconds, retries included.
    pub timeout_secs: u64,
    /// Page size for list calls.
    pub page_size: u32,
    /// Attempts per call for retryable failures.
    pub max_attempts: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// App Mesh client for one account and region.
#[derive(Debug, Clone)]
pub struct SdkAppMeshApi {
    client: Client,
    page_size: i32,
}

impl SdkAppMeshApi {
    /// Wraps an SDK client.
    #[must_use]
    pub fn new(client: Client, page_size: u32) -> Self {
        Self {
            client,
            page_size: i32::try_from(page_size).unwrap_or(i32::MAX),
        }
    }
}

/// Maps a failed response to a provider error.
fn classify(
    status: Option<u16>,
    code: &str,
    message: &str,
    resource_type: &'static str,
    name: &str,
) -> EnforcerError {
    match code {
        "NotFoundException" => ProviderError::not_found(resource_type, name).into(),
        "ForbiddenException"
        | "UnauthorizedException"
        | "AccessDeniedException"
        | "UnrecognizedClientException"
        | "InvalidSignatureException"
        | "ExpiredTokenException" => ProviderError::AuthenticationFailed {
            message: format!("{code}: {message}"),
        }
        .into(),
        "TooManyRequestsException" | "ThrottlingException" => {
            ProviderError::RateLimited { retry_after_secs: 1 }.into()
        }
        _ if status.is_some_and(|s| s >= 500) => {
            ProviderError::network(format!("Server error {code}: {message}")).into()
        }
        _ => ProviderError::api_error(status.unwrap_or_default(), code, message).into(),
    }
}

/// Maps an SDK error, using the operation's own not-found accessor.
fn sdk_error<E>(
    err: &SdkError<E>,
    resource_type: &'static str,
    name: &str,
    is_not_found: impl FnOnce(&E) -> bool,
) -> EnforcerError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if err.as_service_error().is_some_and(is_not_found) {
        return ProviderError::not_found(resource_type, name).into();
    }

    match err.as_service_error() {
        Some(service) => classify(
            err.raw_response().map(|r| r.status().as_u16()),
            service.code().unwrap_or("Unknown"),
            service.message().unwrap_or_default(),
            resource_type,
            name,
        ),
        None => ProviderError::network(DisplayErrorContext(err).to_string()).into(),
    }
}

/// Unwraps a response payload App Mesh always sends.
fn payload<S, T>(
    value: Option<&S>,
    resource_type: &str,
    convert: impl FnOnce(&S) -> Result<T>,
) -> Result<T> {
    value.map_or_else(
        || {
            Err(ProviderError::InvalidResponse {
                message: format!("{resource_type} missing from response"),
            }
            .into())
        },
        convert,
    )
}

#[async_trait]
impl AppMeshApi for SdkAppMeshApi {
    async fn describe_virtual_service(
        &self,
        mesh_name: &str,
        virtual_service_name: &str,
    ) -> Result<VirtualServiceData> {
        trace!("DescribeVirtualService {mesh_name}/{virtual_service_name}");
        let output = self
            .client
            .describe_virtual_service()
            .mesh_name(mesh_name)
            .virtual_service_name(virtual_service_name)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    &e,
                    "virtual service",
                    virtual_service_name,
                    DescribeVirtualServiceError::is_not_found_exception,
                )
            })?;
        payload(
            output.virtual_service(),
            "virtual service",
            convert::virtual_service_from_sdk,
        )
    }

    async fn create_virtual_service(&self, desired: &VirtualServiceData) -> Result<VirtualServiceData> {
        let name = &desired.virtual_service_name;
        let output = self
            .client
            .create_virtual_service()
            .mesh_name(&desired.mesh_name)
            .virtual_service_name(name)
            .spec(convert::virtual_service_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual service", name, |_| false))?;
        payload(
            output.virtual_service(),
            "virtual service",
            convert::virtual_service_from_sdk,
        )
    }

    async fn update_virtual_service(&self, desired: &VirtualServiceData) -> Result<VirtualServiceData> {
        let name = &desired.virtual_service_name;
        let output = self
            .client
            .update_virtual_service()
            .mesh_name(&desired.mesh_name)
            .virtual_service_name(name)
            .spec(convert::virtual_service_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual service", name, |_| false))?;
        payload(
            output.virtual_service(),
            "virtual service",
            convert::virtual_service_from_sdk,
        )
    }

    async fn describe_virtual_router(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
    ) -> Result<VirtualRouterData> {
        trace!("DescribeVirtualRouter {mesh_name}/{virtual_router_name}");
        let output = self
            .client
            .describe_virtual_router()
            .mesh_name(mesh_name)
            .virtual_router_name(virtual_router_name)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    &e,
                    "virtual router",
                    virtual_router_name,
                    DescribeVirtualRouterError::is_not_found_exception,
                )
            })?;
        payload(
            output.virtual_router(),
            "virtual router",
            convert::virtual_router_from_sdk,
        )
    }

    async fn create_virtual_router(&self, desired: &VirtualRouterData) -> Result<VirtualRouterData> {
        let name = &desired.virtual_router_name;
        let output = self
            .client
            .create_virtual_router()
            .mesh_name(&desired.mesh_name)
            .virtual_router_name(name)
            .spec(convert::virtual_router_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual router", name, |_| false))?;
        payload(
            output.virtual_router(),
            "virtual router",
            convert::virtual_router_from_sdk,
        )
    }

    async fn update_virtual_router(&self, desired: &VirtualRouterData) -> Result<VirtualRouterData> {
        let name = &desired.virtual_router_name;
        let output = self
            .client
            .update_virtual_router()
            .mesh_name(&desired.mesh_name)
            .virtual_router_name(name)
            .spec(convert::virtual_router_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual router", name, |_| false))?;
        payload(
            output.virtual_router(),
            "virtual router",
            convert::virtual_router_from_sdk,
        )
    }

    async fn describe_route(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        route_name: &str,
    ) -> Result<RouteData> {
        trace!("DescribeRoute {mesh_name}/{virtual_router_name}/{route_name}");
        let output = self
            .client
            .describe_route()
            .mesh_name(mesh_name)
            .virtual_router_name(virtual_router_name)
            .route_name(route_name)
            .send()
            .await
            .map_err(|e| {
                sdk_error(&e, "route", route_name, DescribeRouteError::is_not_found_exception)
            })?;
        payload(output.route(), "route", convert::route_from_sdk)
    }

    async fn create_route(&self, desired: &RouteData) -> Result<RouteData> {
        let output = self
            .client
            .create_route()
            .mesh_name(&desired.mesh_name)
            .virtual_router_name(&desired.virtual_router_name)
            .route_name(&desired.route_name)
            .spec(convert::route_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "route", &desired.route_name, |_| false))?;
        payload(output.route(), "route", convert::route_from_sdk)
    }

    async fn update_route(&self, desired: &RouteData) -> Result<RouteData> {
        let output = self
            .client
            .update_route()
            .mesh_name(&desired.mesh_name)
            .virtual_router_name(&desired.virtual_router_name)
            .route_name(&desired.route_name)
            .spec(convert::route_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "route", &desired.route_name, |_| false))?;
        payload(output.route(), "route", convert::route_from_sdk)
    }

    async fn delete_route(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        route_name: &str,
    ) -> Result<()> {
        debug!("DeleteRoute {mesh_name}/{virtual_router_name}/{route_name}");
        self.client
            .delete_route()
            .mesh_name(mesh_name)
            .virtual_router_name(virtual_router_name)
            .route_name(route_name)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "route", route_name, DeleteRouteError::is_not_found_exception))?;
        Ok(())
    }

    async fn describe_virtual_node(
        &self,
        mesh_name: &str,
        virtual_node_name: &str,
    ) -> Result<VirtualNodeData> {
        trace!("DescribeVirtualNode {mesh_name}/{virtual_node_name}");
        let output = self
            .client
            .describe_virtual_node()
            .mesh_name(mesh_name)
            .virtual_node_name(virtual_node_name)
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    &e,
                    "virtual node",
                    virtual_node_name,
                    DescribeVirtualNodeError::is_not_found_exception,
                )
            })?;
        payload(
            output.virtual_node(),
            "virtual node",
            convert::virtual_node_from_sdk,
        )
    }

    async fn create_virtual_node(&self, desired: &VirtualNodeData) -> Result<VirtualNodeData> {
        let name = &desired.virtual_node_name;
        let output = self
            .client
            .create_virtual_node()
            .mesh_name(&desired.mesh_name)
            .virtual_node_name(name)
            .spec(convert::virtual_node_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual node", name, |_| false))?;
        payload(
            output.virtual_node(),
            "virtual node",
            convert::virtual_node_from_sdk,
        )
    }

    async fn update_virtual_node(&self, desired: &VirtualNodeData) -> Result<VirtualNodeData> {
        let name = &desired.virtual_node_name;
        let output = self
            .client
            .update_virtual_node()
            .mesh_name(&desired.mesh_name)
            .virtual_node_name(name)
            .spec(convert::virtual_node_spec(&desired.spec)?)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual node", name, |_| false))?;
        payload(
            output.virtual_node(),
            "virtual node",
            convert::virtual_node_from_sdk,
        )
    }

    async fn list_virtual_routers(
        &self,
        mesh_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<VirtualRouterRef>> {
        let output = self
            .client
            .list_virtual_routers()
            .mesh_name(mesh_name)
            .limit(self.page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "mesh", mesh_name, |_| false))?;

        Ok(Page::new(
            output
                .virtual_routers()
                .iter()
                .map(convert::virtual_router_ref)
                .collect(),
            output.next_token().map(str::to_string),
        ))
    }

    async fn list_routes(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<RouteRef>> {
        let output = self
            .client
            .list_routes()
            .mesh_name(mesh_name)
            .virtual_router_name(virtual_router_name)
            .limit(self.page_size)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(&e, "virtual router", virtual_router_name, |_| false))?;

        Ok(Page::new(
            output.routes().iter().map(convert::route_ref).collect(),
            output.next_token().map(str::to_string),
        ))
    }
}

/// Builds an App Mesh client for a mesh.
pub trait AppMeshApiFactory: Send + Sync {
    /// Creates a client for the mesh's account and region.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    fn create(&self, mesh: &AppMeshSpec, credentials: AccountCredentials) -> Result<Arc<dyn AppMeshApi>>;
}

/// Factory producing [`SdkAppMeshApi`] clients from a shared base config.
#[derive(Debug, Clone)]
pub struct SdkAppMeshApiFactory {
    base: SdkConfig,
    settings: ClientSettings,
}

impl SdkAppMeshApiFactory {
    /// Creates a factory over an already loaded AWS config.
    #[must_use]
    pub const fn new(base: SdkConfig, settings: ClientSettings) -> Self {
        Self { base, settings }
    }

    /// Builds the SDK config for one account and region.
    fn client_config(&self, region: &str, credentials: AccountCredentials) -> aws_sdk_appmesh::Config {
        let timeout = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(self.settings.timeout_secs))
            .build();

        let mut builder = aws_sdk_appmesh::config::Builder::from(&self.base)
            .region(Region::new(region.to_string()))
            .retry_config(RetryConfig::standard().with_max_attempts(self.settings.max_attempts))
            .timeout_config(timeout);

        if let AccountCredentials::Provider(provider) = credentials {
            builder = builder.credentials_provider(provider);
        }
        if let Some(endpoint) = &self.settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        builder.build()
    }
}

impl AppMeshApiFactory for SdkAppMeshApiFactory {
    fn create(&self, mesh: &AppMeshSpec, credentials: AccountCredentials) -> Result<Arc<dyn AppMeshApi>> {
        debug!(
            "Creating App Mesh client for account {} in {}",
            mesh.aws_account_id, mesh.region
        );
        let client = Client::from_conf(self.client_config(&mesh.region, credentials));
        Ok(Arc::new(SdkAppMeshApi::new(client, self.settings.page_size)))
    }
}
