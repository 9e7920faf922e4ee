//! S3-based resource store backend.
//!
//! This module provides a remote store using AWS S3 (or compatible services):
//! the manifest lives at `<prefix>manifest.yaml` and statuses at
//! `<prefix>status.json`.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{EnforcerError, Result, StoreError};
use crate::model::{
    AccessControlPolicy, Mesh, MeshService, MeshWorkload, ObjectRef, VirtualMesh,
    VirtualMeshStatus,
};

use super::manifest::{fingerprint, Manifest, StatusFile};
use super::resource_store::ResourceStore;

/// Manifest key suffix.
const MANIFEST_KEY: &str = "manifest.yaml";

/// Status key suffix.
const STATUS_KEY: &str = "status.json";

/// S3-based resource store.
#[derive(Debug)]
pub struct S3ResourceStore {
    /// S3 client.
    client: Client,
    /// Bucket name.
    bucket: String,
    /// Key prefix.
    prefix: String,
    /// Serializes read-modify-write cycles on the status object.
    status_lock: Mutex<()>,
}

impl S3ResourceStore {
    /// Creates a new S3 resource store.
    pub async fn new(bucket: &str, prefix: Option<&str>, region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self::with_client(Client::new(&config), bucket, prefix)
    }

    /// Creates a new S3 resource store with an existing client.
    #[must_use]
    pub fn with_client(client: Client, bucket: &str, prefix: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: normalize_prefix(prefix),
            status_lock: Mutex::new(()),
        }
    }

    /// Gets the full S3 key for a file.
    fn key(&self, file: &str) -> String {
        format!("{}{file}", self.prefix)
    }

    /// Gets an object from S3.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(response) => {
                let bytes = response.body.collect().await.map_err(|e| {
                    EnforcerError::Store(StoreError::s3(format!("Failed to read S3 object: {e}")))
                })?;
                Ok(Some(bytes.to_vec()))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(EnforcerError::Store(StoreError::s3(format!(
                        "S3 get error: {service_err}"
                    ))))
                }
            }
        }
    }

    /// Puts an object to S3.
    async fn put_object(&self, key: &str, content: &str, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(content.as_bytes().to_vec().into())
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| EnforcerError::Store(StoreError::s3(format!("S3 put error: {e}"))))?;

        Ok(())
    }

    /// Reads the raw manifest bytes; a missing manifest is an error.
    async fn read_manifest_bytes(&self) -> Result<Vec<u8>> {
        let key = self.key(MANIFEST_KEY);
        self.get_object(&key).await?.ok_or_else(|| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!("Manifest s3://{}/{key} does not exist", self.bucket),
            })
        })
    }

    /// Loads and parses the manifest.
    async fn load_manifest(&self) -> Result<Manifest> {
        let bytes = self.read_manifest_bytes().await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            EnforcerError::Store(StoreError::Corrupted {
                message: format!("Invalid UTF-8 in S3 manifest: {e}"),
            })
        })?;

        let location = format!("s3://{}/{}", self.bucket, self.key(MANIFEST_KEY));
        Manifest::from_yaml(&content, &location)
    }

    /// Loads the status document, or an empty one if none was written yet.
    async fn load_statuses(&self) -> Result<StatusFile> {
        let key = self.key(STATUS_KEY);
        debug!("Loading statuses from s3://{}/{key}", self.bucket);

        match self.get_object(&key).await? {
            Some(bytes) => {
                let content = String::from_utf8(bytes).map_err(|e| {
                    EnforcerError::Store(StoreError::Corrupted {
                        message: format!("Invalid UTF-8 in S3 status object: {e}"),
                    })
                })?;
                StatusFile::from_json(&content)
            }
            None => Ok(StatusFile::new()),
        }
    }
}

/// Normalizes a key prefix to either empty or `segment/`.
fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| {
            let p = p.trim_matches('/');
            if p.is_empty() {
                String::new()
            } else {
                format!("{p}/")
            }
        })
        .unwrap_or_default()
}

#[async_trait]
impl ResourceStore for S3ResourceStore {
    async fn list_meshes(&self) -> Result<Vec<Mesh>> {
        Ok(self.load_manifest().await?.meshes)
    }

    async fn list_mesh_services(&self) -> Result<Vec<MeshService>> {
        Ok(self.load_manifest().await?.mesh_services)
    }

    async fn list_mesh_workloads(&self) -> Result<Vec<MeshWorkload>> {
        Ok(self.load_manifest().await?.mesh_workloads)
    }

    async fn list_access_control_policies(&self) -> Result<Vec<AccessControlPolicy>> {
        Ok(self.load_manifest().await?.access_control_policies)
    }

    async fn list_virtual_meshes(&self) -> Result<Vec<VirtualMesh>> {
        let manifest = self.load_manifest().await?;
        let statuses = self.load_statuses().await?;
        Ok(manifest.virtual_meshes_with_status(&statuses))
    }

    async fn update_virtual_mesh_status(
        &self,
        virtual_mesh: &ObjectRef,
        status: &VirtualMeshStatus,
    ) -> Result<()> {
        let _guard = self.status_lock.lock().await;

        let mut statuses = self.load_statuses().await?;
        statuses.set(virtual_mesh, status.clone());

        let key = self.key(STATUS_KEY);
        self.put_object(&key, &statuses.to_json()?, "application/json")
            .await?;

        info!(
            "Updated status of virtual mesh {virtual_mesh} in s3://{}/{key}: {}",
            self.bucket, status.access_control_enforcement.state
        );
        Ok(())
    }

    async fn fingerprint(&self) -> Result<String> {
        Ok(fingerprint(&self.read_manifest_bytes().await?))
    }

    fn backend_type(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(None), "");
        assert_eq!(normalize_prefix(Some("/")), "");
        assert_eq!(normalize_prefix(Some("prod")), "prod/");
        assert_eq!(normalize_prefix(Some("/prod/mesh/")), "prod/mesh/");
    }
}
