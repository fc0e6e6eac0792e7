//! Provider Registry
//!
//! Name -> provider map. Constructed once and passed to whoever needs it;
//! there is no process-wide instance.

use super::aggregator::{AuthState, Provider};
use crate::error::InventoryError;
use crate::resource::Kind;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Summary of a registered provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub description: String,
    pub authenticated: bool,
    pub supported_kinds: Vec<Kind>,
    pub supported_regions: Vec<String>,
}

/// Concurrency-safe provider registry.
///
/// Readers never see a half-inserted entry: every mutation happens under
/// the write lock, and the lock is never held across an await.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`. Fails on an empty or taken name.
    pub fn register(&self, name: &str, provider: Arc<Provider>) -> Result<(), InventoryError> {
        if name.trim().is_empty() {
            return Err(InventoryError::validation("provider name", "must not be empty"));
        }

        let mut providers = self.write();
        if providers.contains_key(name) {
            return Err(InventoryError::AlreadyRegistered(name.to_string()));
        }
        providers.insert(name.to_string(), provider);
        tracing::debug!(provider = name, "Registered provider");
        Ok(())
    }

    /// Remove a provider
    pub fn unregister(&self, name: &str) -> Result<Arc<Provider>, InventoryError> {
        self.write()
            .remove(name)
            .ok_or_else(|| InventoryError::ProviderNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Provider>, InventoryError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| InventoryError::ProviderNotFound(name.to_string()))
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Describe one provider
    pub async fn info(&self, name: &str) -> Result<ProviderInfo, InventoryError> {
        let provider = self.get(name)?;
        Ok(ProviderInfo {
            name: name.to_string(),
            description: provider.description().to_string(),
            authenticated: provider.state().await == AuthState::Authenticated,
            supported_kinds: provider.list_supported_kinds(),
            supported_regions: provider.list_supported_regions(),
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Provider>>> {
        // Poisoning is ignored: every mutation is a single insert or remove
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Provider>>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }
}
