//! Validation for the enforcer configuration and topology manifests.
//!
//! Both validators collect every problem in one pass, so an operator sees
//! the full list instead of fixing errors one run at a time.

use crate::error::{ConfigError, EnforcerError, Result};
use crate::model::{MeshType, ObjectRef, ServiceSelector};
use crate::store::Manifest;
use std::collections::BTreeSet;
use tracing::debug;

use super::spec::{EnforcerConfig, StoreBackend};

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for enforcer configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an enforcer configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, config: &EnforcerConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_store(config, &mut result);
        Self::validate_provider(config, &mut result);
        Self::validate_credentials(config, &mut result);
        Self::validate_reconcile(config, &mut result);

        result.into_result("Configuration")
    }

    /// Validates store configuration.
    fn validate_store(config: &EnforcerConfig, result: &mut ValidationResult) {
        let store = &config.store;
        match store.backend {
            StoreBackend::S3 => {
                if store.bucket.as_ref().is_none_or(String::is_empty) {
                    result.error(
                        "store.bucket",
                        "S3 bucket name is required when using S3 backend",
                    );
                }
                if store.status_path.is_some() {
                    result
                        .warnings
                        .push(String::from("store.status_path: ignored by the S3 backend"));
                }
            }
            StoreBackend::Local => {
                if store.bucket.is_some() {
                    result
                        .warnings
                        .push(String::from("store.bucket: ignored by the local backend"));
                }
            }
        }

        if store.manifest.is_empty() {
            result.error("store.manifest", "Manifest path cannot be empty");
        }
    }

    /// Validates provider settings.
    fn validate_provider(config: &EnforcerConfig, result: &mut ValidationResult) {
        let provider = &config.provider;

        if provider.timeout_secs == 0 {
            result.error("provider.timeout_secs", "Timeout must be at least 1 second");
        }

        if !(1..=100).contains(&provider.page_size) {
            result.error(
                "provider.page_size",
                format!("Page size must be between 1 and 100, got {}", provider.page_size),
            );
        }

        if provider.max_attempts == 0 {
            result.error("provider.max_attempts", "At least one attempt is required");
        }

        if let Some(endpoint) = &provider.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                result.error(
                    "provider.endpoint",
                    format!("Endpoint must be an http(s) URL: {endpoint}"),
                );
            } else if endpoint.starts_with("http://") {
                result.warnings.push(format!(
                    "provider.endpoint: {endpoint} is not TLS, use it only with a local emulator"
                ));
            }
        }
    }

    /// Validates credential sources.
    fn validate_credentials(config: &EnforcerConfig, result: &mut ValidationResult) {
        if config.credentials.is_empty() {
            result.warnings.push(String::from(
                "credentials: no accounts configured, App Mesh meshes cannot be reconciled",
            ));
        }

        for (account, source) in &config.credentials {
            let prefix = format!("credentials.{account}");

            if !is_account_id(account) {
                result.error(
                    prefix.clone(),
                    format!("Account id '{account}' must be exactly 12 digits"),
                );
            }

            if source.profile.as_ref().is_some_and(String::is_empty) {
                result.error(format!("{prefix}.profile"), "Profile name cannot be empty");
            }

            match &source.role_arn {
                Some(arn) if !arn.starts_with("arn:") || !arn.contains(":role/") => {
                    result.error(
                        format!("{prefix}.role_arn"),
                        format!("'{arn}' is not an IAM role ARN"),
                    );
                }
                None if source.external_id.is_some() => {
                    result.error(
                        format!("{prefix}.external_id"),
                        "External id requires role_arn",
                    );
                }
                _ => {}
            }
        }
    }

    /// Validates reconcile settings.
    fn validate_reconcile(config: &EnforcerConfig, result: &mut ValidationResult) {
        if config.reconcile.watch_interval_secs == 0 {
            result.error(
                "reconcile.watch_interval_secs",
                "Watch interval must be at least 1 second",
            );
        }

        if !config.reconcile.surface_provider_errors {
            result.warnings.push(String::from(
                "reconcile.surface_provider_errors: provider failures will only be logged",
            ));
        }
    }
}

/// Validator for topology manifests.
#[derive(Debug, Default)]
pub struct ManifestValidator;

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a topology manifest.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, manifest: &Manifest) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        let meshes = Self::validate_meshes(manifest, &mut result);
        Self::validate_services(manifest, &meshes, &mut result);
        Self::validate_workloads(manifest, &meshes, &mut result);
        Self::validate_policies(manifest, &mut result);
        Self::validate_virtual_meshes(manifest, &meshes, &mut result);

        result.into_result("Manifest")
    }

    /// Validates meshes and returns their identities.
    fn validate_meshes(manifest: &Manifest, result: &mut ValidationResult) -> BTreeSet<ObjectRef> {
        let mut seen = BTreeSet::new();

        for (i, mesh) in manifest.meshes.iter().enumerate() {
            let prefix = format!("meshes[{i}]");
            check_identity(&prefix, &mesh.metadata, &mut seen, result);

            match &mesh.mesh_type {
                MeshType::AppMesh(spec) => {
                    if spec.name.is_empty() {
                        result.error(format!("{prefix}.meshType.name"), "App Mesh name cannot be empty");
                    }
                    if !is_account_id(&spec.aws_account_id) {
                        result.error(
                            format!("{prefix}.meshType.awsAccountId"),
                            format!("Account id '{}' must be exactly 12 digits", spec.aws_account_id),
                        );
                    }
                    if spec.region.is_empty() {
                        result.error(format!("{prefix}.meshType.region"), "Region cannot be empty");
                    }
                }
                MeshType::Unsupported => result.warnings.push(format!(
                    "{prefix}: mesh {} has an unsupported type and will be reported INVALID",
                    mesh.metadata
                )),
                MeshType::Istio | MeshType::Linkerd | MeshType::ConsulConnect => {}
            }
        }

        seen
    }

    /// Validates mesh services.
    fn validate_services(
        manifest: &Manifest,
        meshes: &BTreeSet<ObjectRef>,
        result: &mut ValidationResult,
    ) {
        let mut seen = BTreeSet::new();

        for (i, service) in manifest.mesh_services.iter().enumerate() {
            let prefix = format!("meshServices[{i}]");
            check_identity(&prefix, &service.metadata, &mut seen, result);
            check_mesh_ref(&prefix, &service.mesh, meshes, result);

            if !is_dns_label(&service.kube_service.namespace) {
                result.error(
                    format!("{prefix}.kubeService.namespace"),
                    format!(
                        "Namespace '{}' is not a valid DNS label",
                        service.kube_service.namespace
                    ),
                );
            }

            for (j, port) in service.ports.iter().enumerate() {
                check_port(&format!("{prefix}.ports[{j}]"), port.port, &port.protocol, result);
            }

            if service.workload_selector_labels.is_empty() {
                result.warnings.push(format!(
                    "{prefix}: service {} has no workload selector and is never backed",
                    service.metadata
                ));
            }
        }
    }

    /// Validates mesh workloads.
    fn validate_workloads(
        manifest: &Manifest,
        meshes: &BTreeSet<ObjectRef>,
        result: &mut ValidationResult,
    ) {
        let mut seen = BTreeSet::new();

        for (i, workload) in manifest.mesh_workloads.iter().enumerate() {
            let prefix = format!("meshWorkloads[{i}]");
            check_identity(&prefix, &workload.metadata, &mut seen, result);
            check_mesh_ref(&prefix, &workload.mesh, meshes, result);

            if !is_dns_label(&workload.kube_controller.namespace) {
                result.error(
                    format!("{prefix}.kubeController.namespace"),
                    format!(
                        "Namespace '{}' is not a valid DNS label",
                        workload.kube_controller.namespace
                    ),
                );
            }

            for (j, port) in workload.ports.iter().enumerate() {
                check_port(&format!("{prefix}.ports[{j}]"), port.port, &port.protocol, result);
            }
        }
    }

    /// Validates access-control policies.
    fn validate_policies(manifest: &Manifest, result: &mut ValidationResult) {
        let mut seen = BTreeSet::new();
        let kube_services: BTreeSet<ObjectRef> = manifest
            .mesh_services
            .iter()
            .map(|s| ObjectRef::new(&s.kube_service.name, &s.kube_service.namespace))
            .collect();

        for (i, policy) in manifest.access_control_policies.iter().enumerate() {
            let prefix = format!("accessControlPolicies[{i}]");
            check_identity(&prefix, &policy.metadata, &mut seen, result);

            if let Some(ServiceSelector::ServiceRefs(refs)) = &policy.destination_selector {
                if refs.is_empty() {
                    result.error(
                        format!("{prefix}.destinationSelector.serviceRefs"),
                        "Service reference list cannot be empty",
                    );
                }
                for service in refs.iter().filter(|r| !kube_services.contains(*r)) {
                    result.error(
                        format!("{prefix}.destinationSelector.serviceRefs"),
                        format!("Unknown service {service}"),
                    );
                }
            }
        }
    }

    /// Validates virtual meshes.
    fn validate_virtual_meshes(
        manifest: &Manifest,
        meshes: &BTreeSet<ObjectRef>,
        result: &mut ValidationResult,
    ) {
        let mut seen = BTreeSet::new();

        for (i, vm) in manifest.virtual_meshes.iter().enumerate() {
            let prefix = format!("virtualMeshes[{i}]");
            check_identity(&prefix, &vm.metadata, &mut seen, result);

            if vm.meshes.is_empty() {
                result
                    .warnings
                    .push(format!("{prefix}: virtual mesh {} groups no meshes", vm.metadata));
            }

            for (j, mesh) in vm.meshes.iter().enumerate() {
                check_mesh_ref(&format!("{prefix}.meshes[{j}]"), mesh, meshes, result);
            }
        }
    }
}

fn check_identity(
    prefix: &str,
    metadata: &ObjectRef,
    seen: &mut BTreeSet<ObjectRef>,
    result: &mut ValidationResult,
) {
    if metadata.name.is_empty() {
        result.error(format!("{prefix}.metadata.name"), "Name cannot be empty");
    }
    if !is_dns_label(&metadata.namespace) {
        result.error(
            format!("{prefix}.metadata.namespace"),
            format!("Namespace '{}' is not a valid DNS label", metadata.namespace),
        );
    }
    if !seen.insert(metadata.clone()) {
        result.error(
            format!("{prefix}.metadata"),
            format!("Duplicate identity {metadata}"),
        );
    }
}

fn check_mesh_ref(
    prefix: &str,
    mesh: &ObjectRef,
    meshes: &BTreeSet<ObjectRef>,
    result: &mut ValidationResult,
) {
    if !meshes.contains(mesh) {
        result.error(format!("{prefix}.mesh"), format!("Unknown mesh {mesh}"));
    }
}

fn check_port(prefix: &str, port: u16, protocol: &str, result: &mut ValidationResult) {
    if port == 0 {
        result.error(format!("{prefix}.port"), "Port cannot be 0");
    }
    if protocol.is_empty() {
        result.error(format!("{prefix}.protocol"), "Protocol cannot be empty");
    }
}

/// Returns true for a 12-digit AWS account id.
fn is_account_id(id: &str) -> bool {
    id.len() == 12 && id.chars().all(|c| c.is_ascii_digit())
}

/// Returns true for an RFC 1123 DNS label: at most 63 lowercase
/// alphanumerics or hyphens, starting and ending alphanumeric.
fn is_dns_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };

    bytes.len() <= 63
        && first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    fn into_result(self, subject: &str) -> Result<Self> {
        match self.errors.first() {
            None => {
                debug!("{subject} validation passed with {} warnings", self.warnings.len());
                Ok(self)
            }
            Some(first) => {
                let message = if self.errors.len() == 1 {
                    first.message.clone()
                } else {
                    format!("{} (and {} more)", first.message, self.errors.len() - 1)
                };
                Err(EnforcerError::Config(ConfigError::ValidationError {
                    message,
                    field: Some(first.field.clone()),
                }))
            }
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountCredentialSource, EnforcerConfig};
    use crate::testutil::{app_mesh, service, workload};

    #[test]
    fn test_valid_dns_label() {
        assert!(is_dns_label("default"));
        assert!(is_dns_label("mesh-system"));
        assert!(is_dns_label("a1"));
    }

    #[test]
    fn test_invalid_dns_label() {
        assert!(!is_dns_label(""));
        assert!(!is_dns_label("Default")); // uppercase
        assert!(!is_dns_label("team.a")); // dot
        assert!(!is_dns_label("-ns")); // leading hyphen
        assert!(!is_dns_label("ns-")); // trailing hyphen
        assert!(!is_dns_label(&"a".repeat(64)));
    }

    #[test]
    fn test_default_config_is_valid_with_warning() {
        let result = ConfigValidator::new()
            .validate(&EnforcerConfig::default())
            .expect("valid");
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let mut config = EnforcerConfig::default();
        config.store.backend = StoreBackend::S3;

        let err = ConfigValidator::new().validate(&config).expect_err("invalid");
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_bad_account_and_page_size_are_both_reported() {
        let mut config = EnforcerConfig::default();
        config.provider.page_size = 500;
        config
            .credentials
            .insert(String::from("12345"), AccountCredentialSource::default());

        let err = ConfigValidator::new().validate(&config).expect_err("invalid");
        assert!(err.to_string().contains("and 1 more"));
    }

    #[test]
    fn test_credential_source_shapes() {
        let mut config = EnforcerConfig::default();
        config.credentials.insert(
            String::from("123456789012"),
            AccountCredentialSource {
                role_arn: Some(String::from("arn:aws:iam::123456789012:role/mesh-enforcer")),
                external_id: Some(String::from("prod-mesh")),
                ..AccountCredentialSource::default()
            },
        );
        assert!(ConfigValidator::new().validate(&config).is_ok());

        config.credentials.insert(
            String::from("210987654321"),
            AccountCredentialSource {
                external_id: Some(String::from("orphan")),
                ..AccountCredentialSource::default()
            },
        );
        let err = ConfigValidator::new().validate(&config).expect_err("invalid");
        assert!(err.to_string().contains("role_arn"));
    }

    fn manifest() -> Manifest {
        Manifest {
            meshes: vec![app_mesh()],
            mesh_services: vec![service("s1", &[("app", "web")])],
            mesh_workloads: vec![workload("w1", &[("app", "web")])],
            ..Manifest::default()
        }
    }

    #[test]
    fn test_consistent_manifest_is_valid() {
        let result = ManifestValidator::new().validate(&manifest()).expect("valid");
        assert!(result.is_valid());
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let mut manifest = manifest();
        manifest.mesh_workloads.push(workload("w1", &[("app", "api")]));

        let err = ManifestValidator::new().validate(&manifest).expect_err("duplicate");
        assert!(err.to_string().contains("Duplicate identity"));
    }

    #[test]
    fn test_dangling_mesh_ref_is_rejected() {
        let mut manifest = manifest();
        manifest.mesh_services[0].mesh = ObjectRef::new("ghost", "mesh-system");

        let err = ManifestValidator::new().validate(&manifest).expect_err("dangling");
        assert!(err.to_string().contains("Unknown mesh"));
    }
}
