//! Per-account credential resolution.
//!
//! Each App Mesh account resolves to an AWS credentials provider: the
//! process's ambient chain, a named profile, or an assumed role. Providers
//! are built once per account and refresh on their own.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::sts::AssumeRoleProvider;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AccountCredentialSource;
use crate::error::{ReconcileError, Result};

/// Session name recorded on assumed-role sessions.
const SESSION_NAME: &str = "mesh-enforcer";

/// Credentials for one account.
#[derive(Debug, Clone)]
pub enum AccountCredentials {
    /// The process's default credential chain.
    Ambient,
    /// A provider dedicated to the account.
    Provider(SharedCredentialsProvider),
}

impl AccountCredentials {
    /// Creates long-term static credentials.
    #[must_use]
    pub fn from_keys(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self::Provider(SharedCredentialsProvider::new(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "mesh-enforcer-static",
        )))
    }
}

/// Maps an AWS account id to credentials.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolves credentials for an account.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::MissingCredentials` if the account is unknown.
    async fn resolve(&self, account_id: &str) -> Result<AccountCredentials>;
}

/// Resolver backed by the `credentials` section of the config.
#[derive(Debug, Default)]
pub struct StaticCredentialResolver {
    base: Option<SdkConfig>,
    sources: BTreeMap<String, AccountCredentialSource>,
    resolved: Mutex<BTreeMap<String, AccountCredentials>>,
}

impl StaticCredentialResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver from the `credentials` section of the config.
    ///
    /// `base` supplies the region and source credentials for role
    /// assumption.
    #[must_use]
    pub fn from_config(sources: &BTreeMap<String, AccountCredentialSource>, base: SdkConfig) -> Self {
        Self {
            base: Some(base),
            sources: sources.clone(),
            resolved: Mutex::default(),
        }
    }

    /// Registers fixed credentials for an account.
    pub fn insert(&mut self, account_id: impl Into<String>, credentials: AccountCredentials) {
        self.resolved.get_mut().insert(account_id.into(), credentials);
    }

    async fn build(&self, account_id: &str, source: &AccountCredentialSource) -> AccountCredentials {
        let profile = source.profile.as_ref().map(|name| {
            ProfileFileCredentialsProvider::builder()
                .profile_name(name)
                .build()
        });

        let Some(role_arn) = &source.role_arn else {
            return profile.map_or(AccountCredentials::Ambient, |p| {
                debug!("Using profile credentials for account {account_id}");
                AccountCredentials::Provider(SharedCredentialsProvider::new(p))
            });
        };

        debug!("Assuming {role_arn} for account {account_id}");
        let mut builder = AssumeRoleProvider::builder(role_arn).session_name(SESSION_NAME);
        if let Some(external_id) = &source.external_id {
            builder = builder.external_id(external_id);
        }
        if let Some(base) = &self.base {
            builder = builder.configure(base);
        }

        let provider = match profile {
            Some(profile) => builder.build_from_provider(profile).await,
            None => builder.build().await,
        };
        AccountCredentials::Provider(SharedCredentialsProvider::new(provider))
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, account_id: &str) -> Result<AccountCredentials> {
        let mut resolved = self.resolved.lock().await;
        if let Some(credentials) = resolved.get(account_id) {
            return Ok(credentials.clone());
        }

        let source = self.sources.get(account_id).ok_or_else(|| {
            ReconcileError::MissingCredentials {
                account_id: account_id.to_string(),
            }
        })?;

        let credentials = self.build(account_id, source).await;
        resolved.insert(account_id.to_string(), credentials.clone());
        Ok(credentials)
    }
}
