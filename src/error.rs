//! Error types for the mesh enforcer.
//!
//! This module provides the error hierarchy for every stage of an enforcement
//! cycle: configuration, resource-store access, topology resolution,
//! translation, mesh-provider API calls, and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the mesh enforcer.
#[derive(Debug, Error)]
pub enum EnforcerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resource store errors.
    #[error("Resource store error: {0}")]
    Store(#[from] StoreError),

    /// Topology resolution errors.
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Translation errors.
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Mesh provider API errors.
    #[error("Mesh provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Resource store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced object does not exist in the store.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing object.
        kind: &'static str,
        /// Name of the missing object.
        name: String,
        /// Namespace of the missing object.
        namespace: String,
    },

    /// The stored manifest or status is corrupted.
    #[error("Store contents are corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// S3 backend error.
    #[error("S3 store backend error: {message}")]
    S3Error {
        /// Description of the S3 error.
        message: String,
    },

    /// Serialization error.
    #[error("Store serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },
}

/// Topology resolution errors.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A selector references an object that does not exist.
    #[error("Selector references unknown {kind} {namespace}/{name}")]
    SelectorTargetNotFound {
        /// Kind of the referenced object.
        kind: &'static str,
        /// Name of the referenced object.
        name: String,
        /// Namespace of the referenced object.
        namespace: String,
    },

    /// A selector is malformed.
    #[error("Invalid selector on policy {policy}: {message}")]
    InvalidSelector {
        /// The policy carrying the selector.
        policy: String,
        /// Description of the problem.
        message: String,
    },
}

/// Translation errors.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// A route would carry more weighted targets than the provider allows.
    #[error("Service {service} is backed by {count} workloads, exceeding the maximum of {limit} route targets")]
    ExceededMaximumWorkloads {
        /// The service whose route could not be built.
        service: String,
        /// Number of backing workloads.
        count: usize,
        /// Provider limit.
        limit: usize,
    },
}

/// Mesh provider API errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource does not exist.
    #[error("{resource_type} {name} not found")]
    NotFound {
        /// Kind of the missing resource.
        resource_type: &'static str,
        /// Name of the missing resource.
        name: String,
    },

    /// Authentication failed.
    #[error("Mesh provider authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Mesh provider request failed: {status} {code} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Provider error code.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Mesh provider rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with the mesh provider: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from the mesh provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A request could not be built from the desired resource.
    #[error("Invalid mesh provider request: {message}")]
    InvalidRequest {
        /// Description of the request issue.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No credentials are known for the mesh's account.
    #[error("No credentials found for account {account_id}")]
    MissingCredentials {
        /// The account that has no credentials.
        account_id: String,
    },

    /// The mesh type has no known enforcement default.
    #[error("Mesh {mesh} has an unsupported mesh type")]
    UnsupportedMeshType {
        /// The mesh with the unrecognized type.
        mesh: String,
    },

    /// One or more resource categories failed to converge.
    #[error("Reconciliation of mesh {mesh} incomplete: {}", failures.join("; "))]
    Incomplete {
        /// The mesh being reconciled.
        mesh: String,
        /// One message per failed category.
        failures: Vec<String>,
    },
}

/// Result type alias for mesh enforcer operations.
pub type Result<T> = std::result::Result<T, EnforcerError>;

impl EnforcerError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is the provider's "resource absent" signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound { .. }))
    }

    /// Returns true if this error marks the triggering object as invalid
    /// rather than merely failed.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::Reconcile(ReconcileError::UnsupportedMeshType { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StoreError {
    /// Creates an S3 error with the given message.
    #[must_use]
    pub fn s3(message: impl Into<String>) -> Self {
        Self::S3Error {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource_type: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            name: name.into(),
        }
    }
}
