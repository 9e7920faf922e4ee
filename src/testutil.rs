//! Shared fixtures for unit tests: topology builders, an in-memory resource
//! store and an in-memory App Mesh.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::appmesh::{
    AccountCredentials, AppMeshApi, AppMeshApiFactory, Page, RouteData, RouteRef, RouteSpec,
    VirtualNodeData, VirtualRouterData, VirtualRouterRef, VirtualRouterSpec, VirtualServiceData,
};
use crate::error::{ProviderError, Result, StoreError};
use crate::model::{
    AccessControlPolicy, AppMeshSpec, ContainerPort, KubeControllerRef, KubeServiceRef, LabelMatcher,
    Mesh, MeshService, MeshType, MeshWorkload, ObjectRef, ServicePort, ServiceSelector, VirtualMesh,
    VirtualMeshStatus, WorkloadSelector,
};
use crate::store::{Manifest, ResourceStore, StatusFile};

/// Object name of the App Mesh mesh returned by [`app_mesh`].
pub const MESH: &str = "appmesh";

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub fn matcher(pairs: &[(&str, &str)]) -> LabelMatcher {
    LabelMatcher {
        labels: labels(pairs),
        namespaces: Vec::new(),
    }
}

/// A service in the `default` namespace of [`MESH`], selecting workloads by
/// the same labels it carries.
pub fn service(name: &str, selector: &[(&str, &str)]) -> MeshService {
    MeshService {
        metadata: ObjectRef::new(name, "default"),
        mesh: ObjectRef::new(MESH, "mesh-system"),
        kube_service: KubeServiceRef {
            name: name.to_string(),
            namespace: String::from("default"),
            cluster: None,
        },
        workload_selector_labels: labels(selector),
        labels: labels(selector),
        ports: vec![ServicePort {
            name: Some(String::from("http")),
            port: 9080,
            protocol: String::from("http"),
        }],
    }
}

pub fn service_in_mesh(name: &str, mesh_name: &str) -> MeshService {
    MeshService {
        mesh: ObjectRef::new(mesh_name, "mesh-system"),
        ..service(name, &[])
    }
}

pub fn workload(name: &str, workload_labels: &[(&str, &str)]) -> MeshWorkload {
    MeshWorkload {
        metadata: ObjectRef::new(name, "default"),
        mesh: ObjectRef::new(MESH, "mesh-system"),
        kube_controller: KubeControllerRef {
            name: name.to_string(),
            namespace: String::from("default"),
            cluster: None,
        },
        labels: labels(workload_labels),
        service_account: None,
        ports: vec![ContainerPort {
            name: Some(String::from("http")),
            port: 9080,
            protocol: String::from("http"),
        }],
    }
}

pub fn policy(
    name: &str,
    source_selector: Option<WorkloadSelector>,
    destination_selector: Option<ServiceSelector>,
) -> AccessControlPolicy {
    AccessControlPolicy {
        metadata: ObjectRef::new(name, "default"),
        source_selector,
        destination_selector,
    }
}

pub fn app_mesh() -> Mesh {
    Mesh {
        metadata: ObjectRef::new(MESH, "mesh-system"),
        mesh_type: MeshType::AppMesh(AppMeshSpec {
            name: String::from("prod"),
            aws_account_id: String::from("123456789012"),
            region: String::from("us-east-1"),
        }),
    }
}

// ============================================================================
// In-memory resource store
// ============================================================================

#[derive(Default)]
struct MemoryState {
    manifest: Manifest,
    statuses: StatusFile,
    failure: Option<String>,
    generation: u64,
}

/// Resource store backed by a manifest held in memory.
///
/// The fingerprint is a generation counter bumped by every topology
/// mutation; status writes leave it alone.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock")
    }

    fn mutate(&self, apply: impl FnOnce(&mut Manifest)) {
        let mut state = self.lock();
        apply(&mut state.manifest);
        state.generation += 1;
    }

    pub fn add_mesh(&self, mesh: Mesh) {
        self.mutate(|m| m.meshes.push(mesh));
    }

    pub fn add_service(&self, service: MeshService) {
        self.mutate(|m| m.mesh_services.push(service));
    }

    pub fn add_workload(&self, workload: MeshWorkload) {
        self.mutate(|m| m.mesh_workloads.push(workload));
    }

    pub fn add_policy(&self, policy: AccessControlPolicy) {
        self.mutate(|m| m.access_control_policies.push(policy));
    }

    pub fn add_virtual_mesh(&self, virtual_mesh: VirtualMesh) {
        self.mutate(|m| m.virtual_meshes.push(virtual_mesh));
    }

    pub fn remove_virtual_mesh(&self, virtual_mesh: &ObjectRef) {
        self.mutate(|m| m.virtual_meshes.retain(|vm| &vm.metadata != virtual_mesh));
    }

    /// Makes every subsequent list call fail.
    pub fn fail_lists(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    /// Last status written for a virtual mesh.
    pub fn status(&self, virtual_mesh: &ObjectRef) -> Option<VirtualMeshStatus> {
        self.lock().statuses.get(virtual_mesh).cloned()
    }

    fn read<T>(&self, select: impl FnOnce(&MemoryState) -> T) -> Result<T> {
        let state = self.lock();
        if let Some(message) = &state.failure {
            return Err(StoreError::Corrupted {
                message: message.clone(),
            }
            .into());
        }
        Ok(select(&state))
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list_meshes(&self) -> Result<Vec<Mesh>> {
        self.read(|s| s.manifest.meshes.clone())
    }

    async fn list_mesh_services(&self) -> Result<Vec<MeshService>> {
        self.read(|s| s.manifest.mesh_services.clone())
    }

    async fn list_mesh_workloads(&self) -> Result<Vec<MeshWorkload>> {
        self.read(|s| s.manifest.mesh_workloads.clone())
    }

    async fn list_access_control_policies(&self) -> Result<Vec<AccessControlPolicy>> {
        self.read(|s| s.manifest.access_control_policies.clone())
    }

    async fn list_virtual_meshes(&self) -> Result<Vec<VirtualMesh>> {
        self.read(|s| s.manifest.virtual_meshes_with_status(&s.statuses))
    }

    async fn update_virtual_mesh_status(
        &self,
        virtual_mesh: &ObjectRef,
        status: &VirtualMeshStatus,
    ) -> Result<()> {
        self.lock().statuses.set(virtual_mesh, status.clone());
        Ok(())
    }

    async fn fingerprint(&self) -> Result<String> {
        Ok(self.lock().generation.to_string())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// In-memory App Mesh
// ============================================================================

#[derive(Default)]
struct AppMeshState {
    virtual_services: BTreeMap<(String, String), VirtualServiceData>,
    virtual_routers: BTreeMap<(String, String), VirtualRouterData>,
    routes: BTreeMap<(String, String, String), RouteData>,
    virtual_nodes: BTreeMap<(String, String), VirtualNodeData>,
    failing: BTreeSet<String>,
    writes: usize,
}

impl AppMeshState {
    fn write(&mut self, kind: &str) -> Result<()> {
        if self.failing.contains(kind) {
            return Err(ProviderError::api_error(400, "BadRequestException", format!("{kind} rejected")).into());
        }
        self.writes += 1;
        Ok(())
    }
}

/// App Mesh held in memory. Lists page two items at a time.
#[derive(Default)]
pub struct FakeAppMesh {
    state: Mutex<AppMeshState>,
}

const FAKE_PAGE_SIZE: usize = 2;

fn page<T: Clone>(items: &[T], next_token: Option<String>) -> Result<Page<T>> {
    let start = match next_token {
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| ProviderError::api_error(400, "BadRequestException", "invalid nextToken"))?,
        None => 0,
    };
    let end = (start + FAKE_PAGE_SIZE).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    Ok(Page::new(items.get(start..end).unwrap_or_default().to_vec(), next))
}

impl FakeAppMesh {
    fn lock(&self) -> MutexGuard<'_, AppMeshState> {
        self.state.lock().expect("fake app mesh lock")
    }

    /// Number of successful create and update calls.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Makes every create and update of `kind` fail, and deletes of routes.
    pub fn fail_kind(&self, kind: &str) {
        self.lock().failing.insert(kind.to_string());
    }

    /// Number of stored resources of `kind`.
    pub fn count_of(&self, kind: &str) -> usize {
        let state = self.lock();
        match kind {
            "VirtualService" => state.virtual_services.len(),
            "VirtualRouter" => state.virtual_routers.len(),
            "Route" => state.routes.len(),
            "VirtualNode" => state.virtual_nodes.len(),
            _ => 0,
        }
    }

    /// Names of stored resources of `kind`, in key order.
    pub fn names_of(&self, kind: &str) -> Vec<String> {
        let state = self.lock();
        match kind {
            "VirtualService" => state.virtual_services.keys().map(|(_, n)| n.clone()).collect(),
            "VirtualRouter" => state.virtual_routers.keys().map(|(_, n)| n.clone()).collect(),
            "Route" => state.routes.keys().map(|(_, r, n)| format!("{r}/{n}")).collect(),
            "VirtualNode" => state.virtual_nodes.keys().map(|(_, n)| n.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Stores a route, and its router if missing, without counting a write.
    pub fn seed_route(&self, mesh_name: &str, router: &str, route: &str) {
        let mut state = self.lock();
        state
            .virtual_routers
            .entry((mesh_name.to_string(), router.to_string()))
            .or_insert_with(|| VirtualRouterData {
                mesh_name: mesh_name.to_string(),
                virtual_router_name: router.to_string(),
                spec: VirtualRouterSpec::default(),
                metadata: None,
            });
        state.routes.insert(
            (mesh_name.to_string(), router.to_string(), route.to_string()),
            RouteData {
                mesh_name: mesh_name.to_string(),
                virtual_router_name: router.to_string(),
                route_name: route.to_string(),
                spec: RouteSpec::default(),
                metadata: None,
            },
        );
    }

    pub fn has_route(&self, router: &str, route: &str) -> bool {
        self.lock()
            .routes
            .keys()
            .any(|(_, r, name)| r == router && name == route)
    }
}

fn key(mesh_name: &str, name: &str) -> (String, String) {
    (mesh_name.to_string(), name.to_string())
}

#[async_trait]
impl AppMeshApi for FakeAppMesh {
    async fn describe_virtual_service(
        &self,
        mesh_name: &str,
        virtual_service_name: &str,
    ) -> Result<VirtualServiceData> {
        self.lock()
            .virtual_services
            .get(&key(mesh_name, virtual_service_name))
            .cloned()
            .ok_or_else(|| ProviderError::not_found("VirtualService", virtual_service_name).into())
    }

    async fn create_virtual_service(&self, desired: &VirtualServiceData) -> Result<VirtualServiceData> {
        let mut state = self.lock();
        state.write("VirtualService")?;
        state
            .virtual_services
            .insert(key(&desired.mesh_name, &desired.virtual_service_name), desired.clone());
        Ok(desired.clone())
    }

    async fn update_virtual_service(&self, desired: &VirtualServiceData) -> Result<VirtualServiceData> {
        self.create_virtual_service(desired).await
    }

    async fn describe_virtual_router(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
    ) -> Result<VirtualRouterData> {
        self.lock()
            .virtual_routers
            .get(&key(mesh_name, virtual_router_name))
            .cloned()
            .ok_or_else(|| ProviderError::not_found("VirtualRouter", virtual_router_name).into())
    }

    async fn create_virtual_router(&self, desired: &VirtualRouterData) -> Result<VirtualRouterData> {
        let mut state = self.lock();
        state.write("VirtualRouter")?;
        state
            .virtual_routers
            .insert(key(&desired.mesh_name, &desired.virtual_router_name), desired.clone());
        Ok(desired.clone())
    }

    async fn update_virtual_router(&self, desired: &VirtualRouterData) -> Result<VirtualRouterData> {
        self.create_virtual_router(desired).await
    }

    async fn describe_route(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        route_name: &str,
    ) -> Result<RouteData> {
        let route_key = (
            mesh_name.to_string(),
            virtual_router_name.to_string(),
            route_name.to_string(),
        );
        self.lock()
            .routes
            .get(&route_key)
            .cloned()
            .ok_or_else(|| ProviderError::not_found("Route", route_name).into())
    }

    async fn create_route(&self, desired: &RouteData) -> Result<RouteData> {
        let mut state = self.lock();
        state.write("Route")?;
        let route_key = (
            desired.mesh_name.clone(),
            desired.virtual_router_name.clone(),
            desired.route_name.clone(),
        );
        state.routes.insert(route_key, desired.clone());
        Ok(desired.clone())
    }

    async fn update_route(&self, desired: &RouteData) -> Result<RouteData> {
        self.create_route(desired).await
    }

    async fn delete_route(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        route_name: &str,
    ) -> Result<()> {
        let route_key = (
            mesh_name.to_string(),
            virtual_router_name.to_string(),
            route_name.to_string(),
        );
        let mut state = self.lock();
        if state.failing.contains("Route") {
            return Err(ProviderError::api_error(403, "ForbiddenException", "Route delete rejected").into());
        }
        state
            .routes
            .remove(&route_key)
            .map(|_| ())
            .ok_or_else(|| ProviderError::not_found("Route", route_name).into())
    }

    async fn describe_virtual_node(
        &self,
        mesh_name: &str,
        virtual_node_name: &str,
    ) -> Result<VirtualNodeData> {
        self.lock()
            .virtual_nodes
            .get(&key(mesh_name, virtual_node_name))
            .cloned()
            .ok_or_else(|| ProviderError::not_found("VirtualNode", virtual_node_name).into())
    }

    async fn create_virtual_node(&self, desired: &VirtualNodeData) -> Result<VirtualNodeData> {
        let mut state = self.lock();
        state.write("VirtualNode")?;
        state
            .virtual_nodes
            .insert(key(&desired.mesh_name, &desired.virtual_node_name), desired.clone());
        Ok(desired.clone())
    }

    async fn update_virtual_node(&self, desired: &VirtualNodeData) -> Result<VirtualNodeData> {
        self.create_virtual_node(desired).await
    }

    async fn list_virtual_routers(
        &self,
        mesh_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<VirtualRouterRef>> {
        let routers: Vec<VirtualRouterRef> = self
            .lock()
            .virtual_routers
            .values()
            .filter(|r| r.mesh_name == mesh_name)
            .map(|r| VirtualRouterRef {
                mesh_name: r.mesh_name.clone(),
                virtual_router_name: r.virtual_router_name.clone(),
            })
            .collect();
        page(&routers, next_token)
    }

    async fn list_routes(
        &self,
        mesh_name: &str,
        virtual_router_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<RouteRef>> {
        let routes: Vec<RouteRef> = self
            .lock()
            .routes
            .values()
            .filter(|r| r.mesh_name == mesh_name && r.virtual_router_name == virtual_router_name)
            .map(|r| RouteRef {
                mesh_name: r.mesh_name.clone(),
                virtual_router_name: r.virtual_router_name.clone(),
                route_name: r.route_name.clone(),
            })
            .collect();
        page(&routes, next_token)
    }
}

/// Hands out the same [`FakeAppMesh`] for every account.
pub struct FakeAppMeshFactory {
    api: Arc<FakeAppMesh>,
}

impl FakeAppMeshFactory {
    pub const fn new(api: Arc<FakeAppMesh>) -> Self {
        Self { api }
    }
}

impl AppMeshApiFactory for FakeAppMeshFactory {
    fn create(&self, _mesh: &AppMeshSpec, _credentials: AccountCredentials) -> Result<Arc<dyn AppMeshApi>> {
        let api: Arc<dyn AppMeshApi> = self.api.clone();
        Ok(api)
    }
}
