//! App Mesh API operation contract.
//!
//! This module defines the operations the enforcer needs from App Mesh and a
//! lazy paginator over the list operations.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

use super::types::{
    Page, RouteData, RouteRef, VirtualNodeData, VirtualRouterData, VirtualRouterRef,
    VirtualServiceData,
};

/// Operations against one App Mesh account and region.
///
/// Describe calls return `ProviderError::NotFound` when the resource is
/// absent; every other failure is a distinct error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppMeshApi: Send + Sync {
    /// Describes a virtual service.
    async fn describe_virtual_service(
        &self,
        mesh_name: &str,
        virtual_service_name: &str,
    ) -> Result<VirtualServiceData>;

    /// Creates a virtual service.
    async fn create_virtual_service(&self, desired: &VirtualServiceData)
    -> Result<VirtualServiceData>;

    /// Replaces the spec of a virtual service.
    async fn update_virtual_service(&self, desired: &VirtualServiceData)
    -> Result<VirtualServiceData>;

    /// Describes a virtual router.
    async fn describe_virtual_router(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
    ) -> Result<VirtualRouterData>;

    /// Creates a virtual router.
    async fn create_virtual_router(&self, desired: &VirtualRouterData) -> Result<VirtualRouterData>;

    /// Replaces the spec of a virtual router.
    async fn update_virtual_router(&self, desired: &VirtualRouterData) -> Result<VirtualRouterData>;

    /// Describes a route.
    async fn describe_route(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        route_name: &str,
    ) -> Result<RouteData>;

    /// Creates a route.
    async fn create_route(&self, desired: &RouteData) -> Result<RouteData>;

    /// Replaces the spec of a route.
    async fn update_route(&self, desired: &RouteData) -> Result<RouteData>;

    /// Deletes a route.
    async fn delete_route(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        route_name: &str,
    ) -> Result<()>;

    /// Describes a virtual node.
    async fn describe_virtual_node(
        &self,
        mesh_name: &str,
        virtual_node_name: &str,
    ) -> Result<VirtualNodeData>;

    /// Creates a virtual node.
    async fn create_virtual_node(&self, desired: &VirtualNodeData) -> Result<VirtualNodeData>;

    /// Replaces the spec of a virtual node.
    async fn update_virtual_node(&self, desired: &VirtualNodeData) -> Result<VirtualNodeData>;

    /// Lists one page of virtual routers in a mesh.
    async fn list_virtual_routers(
        &self,
        mesh_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<VirtualRouterRef>>;

    /// Lists one page of routes on a virtual router.
    async fn list_routes(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<RouteRef>>;
}

/// Future returned by a page fetch.
pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Page<T>>> + Send + 'a>>;

type PageFetch<'a, T> = Box<dyn Fn(Option<String>) -> PageFuture<'a, T> + Send + Sync + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Start,
    Next(String),
    Done,
}

/// A lazy, finite, restartable sequence of pages.
///
/// Nothing is fetched until [`Paginator::next_page`] is called. The sequence
/// ends on the first page without a continuation token.
pub struct Paginator<'a, T> {
    fetch: PageFetch<'a, T>,
    cursor: Cursor,
}

impl<'a, T> Paginator<'a, T> {
    /// Creates a paginator from a page fetch function.
    pub fn new<F>(fetch: F) -> Self
    where
        F: Fn(Option<String>) -> PageFuture<'a, T> + Send + Sync + 'a,
    {
        Self {
            fetch: Box::new(fetch),
            cursor: Cursor::Start,
        }
    }

    /// Fetches the next page, or returns `None` once the sequence is done.
    ///
    /// An error does not advance the cursor, so the same page is fetched
    /// again on the next call.
    pub async fn next_page(&mut self) -> Option<Result<Vec<T>>> {
        let token = match &self.cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token.clone()),
            Cursor::Done => return None,
        };

        match (self.fetch)(token).await {
            Ok(page) => {
                self.cursor = page.next_token.map_or(Cursor::Done, Cursor::Next);
                Some(Ok(page.items))
            }
            Err(e) => Some(Err(e)),
        }
    }

    /// Fetches every remaining page.
    ///
    /// # Errors
    ///
    /// Returns the first page error.
    pub async fn collect_all(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page?);
        }
        Ok(items)
    }

    /// Rewinds to the first page.
    pub fn restart(&mut self) {
        self.cursor = Cursor::Start;
    }

    /// Returns true once the last page was fetched.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cursor == Cursor::Done
    }
}

impl<'a> Paginator<'a, VirtualRouterRef> {
    /// Pages over the virtual routers of a mesh.
    pub fn virtual_routers(api: &'a dyn AppMeshApi, mesh_name: &'a str) -> Self {
        Self::new(move |token| api.list_virtual_routers(mesh_name, token))
    }
}

impl<'a> Paginator<'a, RouteRef> {
    /// Pages over the routes of a virtual router.
    pub fn routes(api: &'a dyn AppMeshApi, mesh_name: &'a str, virtual_router_name: &'a str) -> Self {
        Self::new(move |token| api.list_routes(mesh_name, virtual_router_name, token))
    }
}
