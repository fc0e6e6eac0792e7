//! Provider Factory
//!
//! Turns a provider name plus configuration into an authenticated
//! [`Provider`]. Connectors are injected so tests can swap in doubles.

use super::aggregator::Provider;
use super::registry::ProviderRegistry;
use super::Connector;
use crate::aws::AwsConnector;
use crate::config::{Config, ProviderConfig};
use crate::error::InventoryError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ProviderFactory {
    connectors: BTreeMap<&'static str, Arc<dyn Connector>>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new().with_connector(Arc::new(AwsConnector::new()))
    }
}

impl ProviderFactory {
    /// Factory with no connectors
    pub fn new() -> Self {
        Self {
            connectors: BTreeMap::new(),
        }
    }

    /// Add (or replace) the connector for its provider name
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(connector.provider_name(), connector);
        self
    }

    /// Provider names this factory can build, sorted
    pub fn supported_providers(&self) -> Vec<&'static str> {
        self.connectors.keys().copied().collect()
    }

    fn connector(&self, name: &str) -> Result<&Arc<dyn Connector>, InventoryError> {
        self.connectors
            .get(name)
            .ok_or_else(|| InventoryError::UnsupportedProvider(name.to_string()))
    }

    /// Validate `config` for provider `name` without any network call
    pub fn validate_config(&self, name: &str, config: &ProviderConfig) -> Result<(), InventoryError> {
        let connector = self.connector(name)?;
        if config.name() != name {
            return Err(InventoryError::InvalidConfig(format!(
                "configuration for '{}' given to provider '{}'",
                config.name(),
                name
            )));
        }
        connector.validate(config)
    }

    /// Validate, construct and authenticate a provider.
    ///
    /// Authentication errors are returned as-is; there is no retry and no
    /// fallback provider.
    pub async fn create_provider(
        &self,
        name: &str,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<Arc<Provider>, InventoryError> {
        self.validate_config(name, config)?;
        let connector = Arc::clone(self.connector(name)?);

        let provider = Provider::new(connector);
        provider.authenticate(config, cancel).await?;

        Ok(Arc::new(provider))
    }

    /// Create and register every enabled provider in `config`.
    ///
    /// Disabled providers are skipped. Returns the failures; providers that
    /// succeeded are in `registry`.
    pub async fn create_enabled(
        &self,
        config: &Config,
        registry: &ProviderRegistry,
        cancel: &CancellationToken,
    ) -> Vec<(String, InventoryError)> {
        let mut failures = Vec::new();

        for provider_config in config.providers() {
            let name = provider_config.name();
            if !provider_config.enabled() {
                tracing::debug!(provider = name, "Provider disabled, skipping");
                continue;
            }

            let created = self
                .create_provider(name, &provider_config, cancel)
                .await
                .and_then(|provider| registry.register(name, provider));

            if let Err(err) = created {
                tracing::warn!(provider = name, "Provider unavailable: {}", err);
                failures.push((name.to_string(), err));
            }
        }

        failures
    }
}
