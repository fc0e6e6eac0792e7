//! Provider aggregator
//!
//! Owns one provider's collectors and exposes the unified query surface.
//! Authentication happens once; afterwards the collector set is read-only
//! and shared with spawned tasks without further locking.

use super::{Collection, Collector, Connector, Inventory, Warning};
use crate::config::ProviderConfig;
use crate::error::InventoryError;
use crate::resource::{cancellable, is_known_kind, normalize_kind, Kind, ResourceFilters, ResourceStatus};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Observable authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    AuthFailed,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
            AuthState::AuthFailed => "auth failed",
        };
        f.write_str(label)
    }
}

enum Session {
    Unauthenticated,
    Authenticating,
    Authenticated(Arc<[Arc<dyn Collector>]>),
    Failed(String),
}

/// One provider: connector, auth state and (once authenticated) its collectors
pub struct Provider {
    connector: Arc<dyn Connector>,
    session: RwLock<Session>,
}

impl Provider {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            session: RwLock::new(Session::Unauthenticated),
        }
    }

    pub fn name(&self) -> &'static str {
        self.connector.provider_name()
    }

    pub fn description(&self) -> &'static str {
        self.connector.description()
    }

    pub async fn state(&self) -> AuthState {
        match &*self.session.read().await {
            Session::Unauthenticated => AuthState::Unauthenticated,
            Session::Authenticating => AuthState::Authenticating,
            Session::Authenticated(_) => AuthState::Authenticated,
            Session::Failed(_) => AuthState::AuthFailed,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state().await == AuthState::Authenticated
    }

    /// Failure message recorded by a failed authentication
    pub async fn auth_failure(&self) -> Option<String> {
        match &*self.session.read().await {
            Session::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Authenticate and build collectors. Runs at most once per instance.
    ///
    /// Calling again after success is a no-op; after failure it fails fast
    /// with [`InventoryError::Unauthenticated`] without touching the network.
    pub async fn authenticate(
        &self,
        config: &ProviderConfig,
        cancel: &CancellationToken,
    ) -> Result<(), InventoryError> {
        {
            let mut session = self.session.write().await;
            match *session {
                Session::Unauthenticated => *session = Session::Authenticating,
                Session::Authenticated(_) => return Ok(()),
                Session::Authenticating => {
                    return Err(InventoryError::AuthenticationInProgress {
                        provider: self.name().to_string(),
                    })
                }
                Session::Failed(_) => return Err(self.unauthenticated()),
            }
        }

        tracing::info!(provider = self.name(), "Authenticating");
        let outcome = cancellable(cancel, self.connector.connect(config)).await;

        let mut session = self.session.write().await;
        match outcome {
            Ok(Ok(collectors)) => {
                tracing::info!(
                    provider = self.name(),
                    collectors = collectors.len(),
                    "Authenticated"
                );
                *session = Session::Authenticated(collectors.into());
                Ok(())
            }
            Ok(Err(source)) => {
                tracing::error!(provider = self.name(), "Authentication failed: {:#}", source);
                *session = Session::Failed(format!("{:#}", source));
                Err(InventoryError::Authentication {
                    provider: self.name().to_string(),
                    source,
                })
            }
            Err(cancelled) => {
                *session = Session::Failed("authentication cancelled".to_string());
                Err(cancelled)
            }
        }
    }

    fn unauthenticated(&self) -> InventoryError {
        InventoryError::Unauthenticated {
            provider: self.name().to_string(),
        }
    }

    /// Collectors, or a fail-fast error when not authenticated
    async fn collectors(&self) -> Result<Arc<[Arc<dyn Collector>]>, InventoryError> {
        match &*self.session.read().await {
            Session::Authenticated(collectors) => Ok(Arc::clone(collectors)),
            _ => Err(self.unauthenticated()),
        }
    }

    /// Collect from every collector concurrently and merge.
    ///
    /// Collector failures become warnings. The only errors are
    /// [`InventoryError::Unauthenticated`] and [`InventoryError::Cancelled`].
    /// Result order is unspecified.
    pub async fn get_resources(
        &self,
        filters: &ResourceFilters,
        cancel: &CancellationToken,
    ) -> Result<Inventory, InventoryError> {
        let collectors = self.collectors().await?;

        let dispatched: Vec<Arc<dyn Collector>> = collectors
            .iter()
            .filter(|c| filters.accepts_any_kind(c.kinds()))
            .cloned()
            .collect();

        tracing::debug!(
            provider = self.name(),
            dispatched = dispatched.len(),
            total = collectors.len(),
            "Fanning out"
        );

        let inventory = fan_out(dispatched, filters, cancel).await?;

        tracing::info!(
            provider = self.name(),
            resources = inventory.resources.len(),
            warnings = inventory.warnings.len(),
            "Collection finished"
        );
        Ok(inventory)
    }

    /// Collect a single kind from the one collector that produces it
    pub async fn get_resources_by_type(
        &self,
        kind: &str,
        filters: &ResourceFilters,
        cancel: &CancellationToken,
    ) -> Result<Inventory, InventoryError> {
        let collectors = self.collectors().await?;

        let resolved = normalize_kind(kind);
        if !is_known_kind(kind) || resolved == Kind::Unknown {
            return Err(InventoryError::UnsupportedKind(kind.to_string()));
        }

        let Some(collector) = collectors.iter().find(|c| c.matches_kind(resolved)) else {
            return Err(InventoryError::UnsupportedKind(kind.to_string()));
        };

        tracing::debug!(provider = self.name(), collector = collector.name(), kind = %resolved, "Dispatching");

        let narrowed = filters.for_term(kind);
        let collection = cancellable(cancel, collector.collect(&narrowed, cancel)).await??;
        Ok(collection.into())
    }

    /// Probe collectors in order until one recognizes `id`
    pub async fn get_resource_status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceStatus, InventoryError> {
        let collectors = self.collectors().await?;

        if id.trim().is_empty() {
            return Err(InventoryError::validation("id", "resource id must not be empty"));
        }

        for collector in collectors.iter() {
            match cancellable(cancel, collector.status(id, cancel)).await? {
                Ok(Some(status)) => {
                    tracing::debug!(collector = collector.name(), id, state = %status.state, "Status found");
                    return Ok(status);
                }
                Ok(None) => {}
                Err(InventoryError::Cancelled) => return Err(InventoryError::Cancelled),
                Err(err) => {
                    tracing::debug!(collector = collector.name(), id, "Status probe failed: {}", err);
                }
            }
        }

        Err(InventoryError::ResourceNotFound(id.to_string()))
    }

    pub fn list_supported_kinds(&self) -> Vec<Kind> {
        self.connector.supported_kinds()
    }

    pub fn list_supported_regions(&self) -> Vec<String> {
        self.connector.supported_regions()
    }
}

/// Spawn one task per collector, join them all and merge.
///
/// The join races `cancel`; on cancellation the [`JoinSet`] is dropped,
/// which aborts every outstanding task.
async fn fan_out(
    collectors: Vec<Arc<dyn Collector>>,
    filters: &ResourceFilters,
    cancel: &CancellationToken,
) -> Result<Inventory, InventoryError> {
    let filters = Arc::new(filters.clone());
    let mut tasks: JoinSet<(&'static str, Result<Collection, InventoryError>)> = JoinSet::new();

    for collector in collectors {
        let filters = Arc::clone(&filters);
        let cancel = cancel.child_token();
        tasks.spawn(async move {
            let outcome = collector.collect(&filters, &cancel).await;
            (collector.name(), outcome)
        });
    }

    let mut inventory = Inventory::default();

    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Cancelled with {} collector(s) outstanding", tasks.len());
                return Err(InventoryError::Cancelled);
            }
            next = tasks.join_next() => next,
        };

        let Some(joined) = joined else {
            break;
        };

        match joined {
            Ok((_, Ok(collection))) => inventory.absorb(collection),
            Ok((_, Err(InventoryError::Cancelled))) => return Err(InventoryError::Cancelled),
            Ok((name, Err(err))) => {
                tracing::warn!(collector = name, "Collector failed: {}", err);
                inventory.warnings.push(Warning::new(name, None, err.to_string()));
            }
            Err(join_err) => {
                tracing::error!("Collector task failed: {}", join_err);
                inventory
                    .warnings
                    .push(Warning::new("aggregator", None, format!("collector task failed: {}", join_err)));
            }
        }
    }

    Ok(inventory)
}
