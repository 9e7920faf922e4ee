//! Configuration module for the mesh enforcer.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `mesh-enforcer.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of the configuration and of topology manifests

mod spec;
mod parser;
mod validator;

pub use spec::{
    AccountCredentialSource, EnforcerConfig, LogFormat, LoggingConfig, ProviderConfig,
    ReconcileConfig, StoreBackend, StoreConfig,
};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use validator::{ConfigValidator, ManifestValidator, ValidationError, ValidationResult};
