//! Configuration parser for loading the enforcer configuration.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, EnforcerError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{EnforcerConfig, LogFormat, StoreBackend};

/// Configuration parser for loading enforcer configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EnforcerConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(EnforcerError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EnforcerError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EnforcerConfig> {
        debug!("Parsing YAML configuration");

        let config: EnforcerConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            EnforcerError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration: {:?} store, {} credential entries",
            config.store.backend,
            config.credentials.len()
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `MESH_ENFORCER_<SECTION>_<KEY>` (e.g., `MESH_ENFORCER_STORE_BUCKET`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<EnforcerConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(
        config: &mut EnforcerConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        // Store overrides
        if let Some(backend) = lookup("MESH_ENFORCER_STORE_BACKEND") {
            debug!("Overriding store.backend from environment");
            config.store.backend = match backend.to_lowercase().as_str() {
                "local" => StoreBackend::Local,
                "s3" => StoreBackend::S3,
                other => return Err(invalid_override("MESH_ENFORCER_STORE_BACKEND", other)),
            };
        }

        if let Some(manifest) = lookup("MESH_ENFORCER_STORE_MANIFEST") {
            debug!("Overriding store.manifest from environment");
            config.store.manifest = manifest;
        }

        if let Some(bucket) = lookup("MESH_ENFORCER_STORE_BUCKET") {
            debug!("Overriding store.bucket from environment");
            config.store.bucket = Some(bucket);
        }

        if let Some(prefix) = lookup("MESH_ENFORCER_STORE_PREFIX") {
            debug!("Overriding store.prefix from environment");
            config.store.prefix = Some(prefix);
        }

        // Provider overrides
        if let Some(endpoint) = lookup("MESH_ENFORCER_PROVIDER_ENDPOINT") {
            debug!("Overriding provider.endpoint from environment");
            config.provider.endpoint = Some(endpoint);
        }

        // Reconcile overrides
        if let Some(interval) = lookup("MESH_ENFORCER_RECONCILE_WATCH_INTERVAL_SECS") {
            debug!("Overriding reconcile.watch_interval_secs from environment");
            config.reconcile.watch_interval_secs = interval.parse().map_err(|_| {
                invalid_override("MESH_ENFORCER_RECONCILE_WATCH_INTERVAL_SECS", &interval)
            })?;
        }

        // Logging overrides
        if let Some(format) = lookup("MESH_ENFORCER_LOGGING_FORMAT") {
            debug!("Overriding logging.format from environment");
            config.logging.format = match format.to_lowercase().as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => return Err(invalid_override("MESH_ENFORCER_LOGGING_FORMAT", other)),
            };
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                EnforcerError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves a path from the config relative to the base path.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

fn invalid_override(name: &str, value: &str) -> EnforcerError {
    EnforcerError::Config(ConfigError::validation(
        format!("Invalid value '{value}' in {name}"),
        name,
    ))
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "mesh-enforcer.yaml",
    "mesh-enforcer.yml",
    ".mesh-enforcer.yaml",
];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(EnforcerError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
