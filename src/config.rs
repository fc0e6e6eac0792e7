//! Configuration Management
//!
//! YAML configuration for cloudview, overlaid with environment variables.
//! The engine only reads it: regions, enabled flags and credential settings
//! flow into the provider factory.

use crate::error::InventoryError;
use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Shortest session AWS accepts for AssumeRole
pub const MIN_SESSION_DURATION: i32 = 900;
/// Longest session AWS accepts for AssumeRole
pub const MAX_SESSION_DURATION: i32 = 43_200;
pub const DEFAULT_SESSION_DURATION: i32 = 3_600;
pub const DEFAULT_SESSION_NAME: &str = "cloudview-session";

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// off, error, warn, info, debug or trace
    pub level: Option<String>,
    /// Log to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// AWS provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AwsConfig {
    pub enabled: bool,
    /// Regions to scan when no region filter is given
    pub regions: Vec<String>,
    /// Single default region, used when `regions` is empty
    pub region: Option<String>,
    pub profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub role_arn: Option<String>,
    pub external_id: Option<String>,
    pub mfa_serial: Option<String>,
    pub mfa_token_code: Option<String>,
    pub duration_seconds: Option<i32>,
    pub session_name: Option<String>,
    /// Override every service endpoint (LocalStack and similar)
    pub endpoint_url: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            regions: vec!["us-east-1".to_string(), "us-west-2".to_string()],
            region: Some("us-east-1".to_string()),
            profile: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            role_arn: None,
            external_id: None,
            mfa_serial: None,
            mfa_token_code: None,
            duration_seconds: None,
            session_name: None,
            endpoint_url: None,
        }
    }
}

impl AwsConfig {
    /// Check shape only. No network, no mutation.
    pub fn validate(&self) -> Result<(), InventoryError> {
        let duration = self.effective_duration();
        if !(MIN_SESSION_DURATION..=MAX_SESSION_DURATION).contains(&duration) {
            return Err(InventoryError::InvalidConfig(format!(
                "duration_seconds must be between {} and {}, got {}",
                MIN_SESSION_DURATION, MAX_SESSION_DURATION, duration
            )));
        }

        match (has_value(&self.access_key_id), has_value(&self.secret_access_key)) {
            (true, false) | (false, true) => {
                return Err(InventoryError::InvalidConfig(
                    "access_key_id and secret_access_key must be set together".to_string(),
                ));
            }
            _ => {}
        }

        let assumes_role = has_value(&self.role_arn);
        if !assumes_role && (has_value(&self.external_id) || has_value(&self.mfa_serial)) {
            return Err(InventoryError::InvalidConfig(
                "external_id and mfa_serial require role_arn".to_string(),
            ));
        }
        if has_value(&self.mfa_serial) && !has_value(&self.mfa_token_code) {
            return Err(InventoryError::InvalidConfig(
                "mfa_serial requires mfa_token_code".to_string(),
            ));
        }

        if self.regions.iter().any(|r| r.trim().is_empty()) {
            return Err(InventoryError::InvalidConfig(
                "regions must not contain empty names".to_string(),
            ));
        }

        Ok(())
    }

    /// Session duration with the default applied
    pub fn effective_duration(&self) -> i32 {
        self.duration_seconds.unwrap_or(DEFAULT_SESSION_DURATION)
    }

    pub fn effective_session_name(&self) -> &str {
        self.session_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SESSION_NAME)
    }

    /// Overlay environment variables: `AWS_*` first, then `CLOUDVIEW_AWS_*`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("AWS_PROFILE") {
            self.profile = Some(v);
        }
        if let Some(v) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
            self.region = Some(v);
        }
        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.access_key_id = Some(v);
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.secret_access_key = Some(v);
        }
        if let Some(v) = get("AWS_SESSION_TOKEN") {
            self.session_token = Some(v);
        }
        if let Some(v) = get("AWS_ROLE_ARN") {
            self.role_arn = Some(v);
        }

        if let Some(v) = get("CLOUDVIEW_AWS_ENABLED") {
            self.enabled = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(v) = get("CLOUDVIEW_AWS_REGIONS") {
            self.regions = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("CLOUDVIEW_AWS_REGION") {
            self.region = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_PROFILE") {
            self.profile = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_ACCESS_KEY_ID") {
            self.access_key_id = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_SECRET_ACCESS_KEY") {
            self.secret_access_key = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_SESSION_TOKEN") {
            self.session_token = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_ROLE_ARN") {
            self.role_arn = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_EXTERNAL_ID") {
            self.external_id = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_MFA_SERIAL") {
            self.mfa_serial = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_MFA_TOKEN_CODE") {
            self.mfa_token_code = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_DURATION_SECONDS") {
            match v.parse() {
                Ok(seconds) => self.duration_seconds = Some(seconds),
                Err(_) => tracing::warn!("Ignoring non-numeric CLOUDVIEW_AWS_DURATION_SECONDS: {}", v),
            }
        }
        if let Some(v) = get("CLOUDVIEW_AWS_SESSION_NAME") {
            self.session_name = Some(v);
        }
        if let Some(v) = get("CLOUDVIEW_AWS_ENDPOINT_URL") {
            self.endpoint_url = Some(v);
        }
    }

    /// Copy with secrets replaced, for display
    pub fn masked(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_string());
        Self {
            secret_access_key: mask(&self.secret_access_key),
            session_token: mask(&self.session_token),
            mfa_token_code: mask(&self.mfa_token_code),
            ..self.clone()
        }
    }
}

fn has_value(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Configuration handed to one provider's connector
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Aws(AwsConfig),
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Aws(_) => "aws",
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            ProviderConfig::Aws(cfg) => cfg.enabled,
        }
    }

    pub fn regions(&self) -> &[String] {
        match self {
            ProviderConfig::Aws(cfg) => &cfg.regions,
        }
    }

    pub fn default_region(&self) -> Option<&str> {
        match self {
            ProviderConfig::Aws(cfg) => cfg.region.as_deref(),
        }
    }

    pub fn as_aws(&self) -> Option<&AwsConfig> {
        match self {
            ProviderConfig::Aws(cfg) => Some(cfg),
        }
    }
}

impl Config {
    /// Default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudview").join("config.yaml"))
    }

    /// Load configuration and apply environment overrides.
    ///
    /// A missing default file yields defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.providers.aws.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Save configuration to `path` (or the default location)
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path().context("Could not determine config directory")?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = format!(
            "# cloudview configuration\n# Environment variables CLOUDVIEW_AWS_* and AWS_* override these values.\n{}",
            serde_yaml::to_string(self)?
        );
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(path)
    }

    /// Validate every provider section
    pub fn validate(&self) -> Result<(), InventoryError> {
        self.providers.aws.validate()
    }

    /// Configuration for a provider by name
    pub fn provider(&self, name: &str) -> Option<ProviderConfig> {
        match name {
            "aws" => Some(ProviderConfig::Aws(self.providers.aws.clone())),
            _ => None,
        }
    }

    /// Every configured provider, enabled or not
    pub fn providers(&self) -> Vec<ProviderConfig> {
        vec![ProviderConfig::Aws(self.providers.aws.clone())]
    }

    /// Copy with secrets masked
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.providers.aws = self.providers.aws.masked();
        copy
    }
}
