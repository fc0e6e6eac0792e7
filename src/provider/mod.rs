//! Provider layer
//!
//! A provider is an authenticated set of per-kind collectors behind one
//! query surface.
//!
//! # Architecture
//!
//! - [`aggregator`] - [`Provider`], the auth state machine and concurrent fan-out
//! - [`registry`] - name -> provider map shared by the CLI
//! - [`factory`] - validates config, constructs and authenticates providers
//!
//! Provider specifics live behind two traits: [`Connector`] turns a
//! configuration into collectors (authenticating on the way) and
//! [`Collector`] fetches one family of kinds.

pub mod aggregator;
pub mod factory;
pub mod registry;

pub use aggregator::{AuthState, Provider};
pub use factory::ProviderFactory;
pub use registry::{ProviderInfo, ProviderRegistry};

use crate::config::ProviderConfig;
use crate::error::InventoryError;
use crate::resource::{Kind, Resource, ResourceFilters, ResourceStatus};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A recovered failure that reduced the result set without failing the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Collector or component that gave up
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(source: impl Into<String>, region: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            region: region.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{} ({}): {}", self.source, region, self.message),
            None => write!(f, "{}: {}", self.source, self.message),
        }
    }
}

/// Output of one collector run
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub resources: Vec<Resource>,
    pub warnings: Vec<Warning>,
}

impl Collection {
    pub fn extend(&mut self, other: Collection) {
        self.resources.extend(other.resources);
        self.warnings.extend(other.warnings);
    }
}

/// Merged output of a query: resources plus the failures that were swallowed
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub resources: Vec<Resource>,
    pub warnings: Vec<Warning>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn absorb(&mut self, collection: Collection) {
        self.resources.extend(collection.resources);
        self.warnings.extend(collection.warnings);
    }
}

impl From<Collection> for Inventory {
    fn from(collection: Collection) -> Self {
        Self {
            resources: collection.resources,
            warnings: collection.warnings,
        }
    }
}

/// Fetches and normalizes one family of resource kinds
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs and warnings ("ec2", "s3", ...)
    fn name(&self) -> &'static str;

    /// Kinds this collector can produce
    fn kinds(&self) -> &'static [Kind];

    fn matches_kind(&self, kind: Kind) -> bool {
        self.kinds().contains(&kind)
    }

    /// Collect every matching resource.
    ///
    /// Region and enrichment failures are recovered and reported in
    /// [`Collection::warnings`]. Errors are reserved for cancellation and for
    /// failures that leave nothing to return.
    async fn collect(
        &self,
        filters: &ResourceFilters,
        cancel: &CancellationToken,
    ) -> Result<Collection, InventoryError>;

    /// Look up one resource by id. `Ok(None)` when this collector does not know it.
    async fn status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError>;
}

/// Provider-specific construction: credentials in, collectors out
#[async_trait]
pub trait Connector: Send + Sync {
    /// Registry key ("aws")
    fn provider_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn supported_regions(&self) -> Vec<String>;

    fn supported_kinds(&self) -> Vec<Kind>;

    /// Check config shape without any network call
    fn validate(&self, config: &ProviderConfig) -> Result<(), InventoryError>;

    /// Resolve credentials, verify them with an identity check and build
    /// every collector on top of the resulting client.
    async fn connect(&self, config: &ProviderConfig) -> anyhow::Result<Vec<Arc<dyn Collector>>>;
}
