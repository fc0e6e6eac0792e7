//! AWS Authentication
//!
//! Resolves credentials from static keys, a named profile or the default
//! chain, optionally assumes a role on top, and verifies the result with
//! STS GetCallerIdentity before any collector is built.

use super::client::{AwsClient, SUPPORTED_REGIONS};
use super::error::AwsError;
use super::{
    ComputeCollector, DatabaseCollector, IdentityCollector, NetworkCollector, StorageCollector,
};
use crate::config::{AwsConfig, ProviderConfig};
use crate::error::InventoryError;
use crate::provider::{Collector, Connector};
use crate::resource::{primary_region, Kind, RegionSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use aws_sdk_sts::config::Credentials;
use std::sync::Arc;
use std::time::SystemTime;

/// Base credential method, in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    StaticKeys,
    Profile(String),
    DefaultChain,
}

impl CredentialSource {
    /// First satisfied method wins
    pub fn resolve(config: &AwsConfig) -> Self {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

        if set(&config.access_key_id) && set(&config.secret_access_key) {
            CredentialSource::StaticKeys
        } else if let Some(profile) = config.profile.as_deref().filter(|p| !p.is_empty()) {
            CredentialSource::Profile(profile.to_string())
        } else {
            CredentialSource::DefaultChain
        }
    }
}

/// Account and principal reported by GetCallerIdentity
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

fn loader(config: &AwsConfig, region: &str) -> ConfigLoader {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    if let Some(url) = config.endpoint_url.as_deref().filter(|u| !u.is_empty()) {
        loader = loader.endpoint_url(url);
    }
    loader
}

/// Build an SDK config carrying the resolved credentials
pub async fn load_sdk_config(config: &AwsConfig, settings: &RegionSettings) -> Result<SdkConfig> {
    let region = primary_region(settings);
    let source = CredentialSource::resolve(config);
    tracing::debug!(?source, region = %region, "Resolving AWS credentials");

    let base = match &source {
        CredentialSource::StaticKeys => {
            let credentials = Credentials::new(
                config.access_key_id.clone().unwrap_or_default(),
                config.secret_access_key.clone().unwrap_or_default(),
                config.session_token.clone().filter(|t| !t.is_empty()),
                None,
                "cloudview-static",
            );
            loader(config, &region)
                .credentials_provider(credentials)
                .load()
                .await
        }
        CredentialSource::Profile(profile) => {
            loader(config, &region).profile_name(profile).load().await
        }
        CredentialSource::DefaultChain => loader(config, &region).load().await,
    };

    let Some(role_arn) = config.role_arn.as_deref().filter(|r| !r.is_empty()) else {
        return Ok(base);
    };

    let credentials = assume_role(&base, config, role_arn).await?;
    Ok(loader(config, &region)
        .credentials_provider(credentials)
        .load()
        .await)
}

/// Exchange base credentials for role credentials via STS AssumeRole
async fn assume_role(base: &SdkConfig, config: &AwsConfig, role_arn: &str) -> Result<Credentials> {
    tracing::info!(role_arn, "Assuming role");
    let sts = aws_sdk_sts::Client::new(base);

    let mut request = sts
        .assume_role()
        .role_arn(role_arn)
        .role_session_name(config.effective_session_name())
        .duration_seconds(config.effective_duration())
        .set_external_id(config.external_id.clone());

    if let Some(serial) = config.mfa_serial.as_deref() {
        request = request
            .serial_number(serial)
            .set_token_code(config.mfa_token_code.clone());
    }

    let output = request
        .send()
        .await
        .map_err(|e| AwsError::from_sdk(&e))
        .with_context(|| format!("AssumeRole {} failed", role_arn))?;

    let credentials = output
        .credentials()
        .context("AssumeRole returned no credentials")?;

    Ok(Credentials::new(
        credentials.access_key_id(),
        credentials.secret_access_key(),
        Some(credentials.session_token().to_string()),
        SystemTime::try_from(*credentials.expiration()).ok(),
        "cloudview-assume-role",
    ))
}

/// Lightweight identity check used to validate credentials
pub async fn verify_identity(config: &SdkConfig) -> Result<CallerIdentity> {
    let sts = aws_sdk_sts::Client::new(config);
    let output = sts
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| AwsError::from_sdk(&e))
        .context("GetCallerIdentity failed")?;

    Ok(CallerIdentity {
        account: output.account().unwrap_or_default().to_string(),
        arn: output.arn().unwrap_or_default().to_string(),
    })
}

// ============================================================================
// Connector
// ============================================================================

/// Builds the AWS collectors once credentials check out
#[derive(Debug, Default, Clone)]
pub struct AwsConnector;

impl AwsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for AwsConnector {
    fn provider_name(&self) -> &'static str {
        "aws"
    }

    fn description(&self) -> &'static str {
        "Amazon Web Services: EC2, S3, RDS, IAM and VPC"
    }

    fn supported_regions(&self) -> Vec<String> {
        SUPPORTED_REGIONS.iter().map(|r| r.to_string()).collect()
    }

    fn supported_kinds(&self) -> Vec<Kind> {
        let mut kinds = Vec::new();
        kinds.extend_from_slice(ComputeCollector::KINDS);
        kinds.extend_from_slice(StorageCollector::KINDS);
        kinds.extend_from_slice(DatabaseCollector::KINDS);
        kinds.extend_from_slice(IdentityCollector::KINDS);
        kinds.extend_from_slice(NetworkCollector::KINDS);
        kinds
    }

    fn validate(&self, config: &ProviderConfig) -> Result<(), InventoryError> {
        let aws = config.as_aws().ok_or_else(|| {
            InventoryError::InvalidConfig(format!("expected aws configuration, got {}", config.name()))
        })?;
        aws.validate()
    }

    async fn connect(&self, config: &ProviderConfig) -> Result<Vec<Arc<dyn Collector>>> {
        let aws = config
            .as_aws()
            .with_context(|| format!("expected aws configuration, got {}", config.name()))?;

        let settings = RegionSettings::new(aws.regions.clone(), aws.region.clone());
        let sdk_config = load_sdk_config(aws, &settings).await?;

        let identity = verify_identity(&sdk_config).await?;
        tracing::info!(account = %identity.account, arn = %identity.arn, "AWS identity verified");

        let client = AwsClient::new(sdk_config, settings);
        Ok(vec![
            Arc::new(ComputeCollector::new(client.clone())),
            Arc::new(StorageCollector::new(client.clone())),
            Arc::new(DatabaseCollector::new(client.clone())),
            Arc::new(IdentityCollector::new(client.clone())),
            Arc::new(NetworkCollector::new(client)),
        ])
    }
}
