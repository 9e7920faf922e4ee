//! Configuration specification types for the enforcer.
//!
//! This module defines the structs that map to `mesh-enforcer.yaml`. Every
//! section is optional and falls back to defaults suitable for a local run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::appmesh::{ClientSettings, DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS};

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// Resource store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Mesh provider connection settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Credential sources keyed by AWS account id. An account with an empty
    /// entry uses the ambient AWS credential chain.
    #[serde(default)]
    pub credentials: BTreeMap<String, AccountCredentialSource>,
    /// Reconciliation behavior.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resource store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: StoreBackend,
    /// Topology manifest path, relative to the config file for the local
    /// backend.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Status document path (local backend only).
    #[serde(default)]
    pub status_path: Option<String>,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix (optional).
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
}

/// Resource store backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local file-based store.
    #[default]
    Local,
    /// AWS S3-based store.
    S3,
}

/// Mesh provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Endpoint override, e.g. a local emulator.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Operation timeout in seconds, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Page size for list calls.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Attempts per call for throttled or transient failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Where one account's credentials come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountCredentialSource {
    /// Named profile from the shared AWS config files.
    #[serde(default)]
    pub profile: Option<String>,
    /// Role to assume in the account. The profile, if set, is the source
    /// identity; otherwise the ambient chain is.
    #[serde(default)]
    pub role_arn: Option<String>,
    /// External id required by the role's trust policy.
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Reconciliation behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Report provider failures in the virtual mesh status. When false,
    /// failures are only logged.
    #[serde(default = "default_surface_provider_errors")]
    pub surface_provider_errors: bool,
    /// Poll interval in watch mode.
    #[serde(default = "default_watch_interval_secs")]
    pub watch_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            manifest: default_manifest(),
            status_path: None,
            bucket: None,
            prefix: None,
            region: None,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ProviderConfig {
    /// Converts to App Mesh client settings.
    #[must_use]
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            endpoint: self.endpoint.clone(),
            timeout_secs: self.timeout_secs,
            page_size: self.page_size,
            max_attempts: self.max_attempts,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            surface_provider_errors: default_surface_provider_errors(),
            watch_interval_secs: default_watch_interval_secs(),
        }
    }
}

fn default_manifest() -> String {
    String::from("topology.yaml")
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_surface_provider_errors() -> bool {
    true
}

const fn default_watch_interval_secs() -> u64 {
    30
}
