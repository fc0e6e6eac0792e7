//! Integration tests for the provider aggregator, registry and factory
//!
//! A fake connector hands out fake collectors with call counters, so these
//! tests cover fan-out, partial failure, the authentication state machine and
//! cancellation without any network.

use anyhow::anyhow;
use async_trait::async_trait;
use cloudview::config::{AwsConfig, Config, ProviderConfig};
use cloudview::error::InventoryError;
use cloudview::provider::{
    AuthState, Collection, Collector, Connector, Provider, ProviderFactory, ProviderRegistry,
};
use cloudview::resource::{Kind, Resource, ResourceFilters, ResourceStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fakes
// ============================================================================

struct FakeCollector {
    name: &'static str,
    kinds: &'static [Kind],
    resources: Vec<Resource>,
    failure: Option<&'static str>,
    delay: Option<Duration>,
    known_id: Option<&'static str>,
    calls: AtomicUsize,
}

impl FakeCollector {
    fn new(name: &'static str, kinds: &'static [Kind]) -> Self {
        Self {
            name,
            kinds,
            resources: Vec::new(),
            failure: None,
            delay: None,
            known_id: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_resources(mut self, ids: &[&str], region: &str) -> Self {
        let kind = self.kinds[0];
        self.resources = ids
            .iter()
            .map(|id| Resource::new(*id, "", kind, "aws", region).with_state("running"))
            .collect();
        self
    }

    fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    fn failing(mut self, message: &'static str) -> Self {
        self.failure = Some(message);
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn knowing(mut self, id: &'static str) -> Self {
        self.known_id = Some(id);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Collector for FakeCollector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kinds(&self) -> &'static [Kind] {
        self.kinds
    }

    async fn collect(
        &self,
        filters: &ResourceFilters,
        _cancel: &CancellationToken,
    ) -> Result<Collection, InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure {
            return Err(anyhow!(message).into());
        }
        Ok(Collection {
            resources: self
                .resources
                .iter()
                .filter(|r| filters.matches(r))
                .cloned()
                .collect(),
            warnings: Vec::new(),
        })
    }

    async fn status(
        &self,
        id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.known_id == Some(id) {
            Ok(Some(ResourceStatus::observed(self.kinds[0], "running")))
        } else {
            Ok(None)
        }
    }
}

struct FakeConnector {
    collectors: Vec<Arc<FakeCollector>>,
    auth_failure: Option<&'static str>,
    connects: AtomicUsize,
}

impl FakeConnector {
    fn new(collectors: Vec<Arc<FakeCollector>>) -> Self {
        Self {
            collectors,
            auth_failure: None,
            connects: AtomicUsize::new(0),
        }
    }

    fn rejecting(mut self, message: &'static str) -> Self {
        self.auth_failure = Some(message);
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn provider_name(&self) -> &'static str {
        "aws"
    }

    fn description(&self) -> &'static str {
        "fake aws"
    }

    fn supported_regions(&self) -> Vec<String> {
        vec!["us-east-1".to_string(), "us-west-2".to_string()]
    }

    fn supported_kinds(&self) -> Vec<Kind> {
        self.collectors
            .iter()
            .flat_map(|c| c.kinds().iter().copied())
            .collect()
    }

    fn validate(&self, config: &ProviderConfig) -> Result<(), InventoryError> {
        match config.as_aws() {
            Some(aws) => aws.validate(),
            None => Err(InventoryError::InvalidConfig("not aws".to_string())),
        }
    }

    async fn connect(&self, _config: &ProviderConfig) -> anyhow::Result<Vec<Arc<dyn Collector>>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.auth_failure {
            anyhow::bail!("{}", message);
        }
        Ok(self
            .collectors
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn Collector>)
            .collect())
    }
}

fn aws_config() -> ProviderConfig {
    ProviderConfig::Aws(AwsConfig::default())
}

fn compute() -> FakeCollector {
    FakeCollector::new("ec2", &[Kind::VirtualMachine])
}

fn storage() -> FakeCollector {
    FakeCollector::new("s3", &[Kind::ObjectStorage])
}

fn identity() -> FakeCollector {
    FakeCollector::new("iam", &[Kind::IamUser, Kind::IamRole, Kind::IamPolicy])
        .with_resource(Resource::new("alice", "", Kind::IamUser, "aws", "global").with_state("active"))
        .with_resource(Resource::new("deployer", "", Kind::IamRole, "aws", "global").with_state("active"))
        .with_resource(
            Resource::new("arn:aws:iam::123456789012:policy/ops", "", Kind::IamPolicy, "aws", "global")
                .with_state("active"),
        )
}

fn database() -> FakeCollector {
    let mut instance = Resource::new("orders-db", "", Kind::Database, "aws", "us-east-1");
    instance.set_metadata("resource_subtype", serde_json::json!("instance"));
    let mut cluster = Resource::new("aurora-main", "", Kind::Database, "aws", "us-east-1");
    cluster.set_metadata("resource_subtype", serde_json::json!("cluster"));

    FakeCollector::new("rds", &[Kind::Database])
        .with_resource(instance)
        .with_resource(cluster)
}

fn sorted_ids(inventory: &cloudview::provider::Inventory) -> Vec<&str> {
    let mut ids: Vec<&str> = inventory.resources.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    ids
}

/// `assert_err!` needs a `Debug` success type; providers are not `Debug`
fn expect_err<T>(result: Result<T, InventoryError>) -> InventoryError {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(err) => err,
    }
}

async fn authenticated(connector: FakeConnector) -> Provider {
    let provider = Provider::new(Arc::new(connector));
    assert_ok!(provider.authenticate(&aws_config(), &CancellationToken::new()).await);
    provider
}

// ============================================================================
// Aggregation
// ============================================================================

mod aggregation_tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_merges_every_collector() {
        let ec2 = Arc::new(compute().with_resources(&["i-1", "i-2"], "us-east-1"));
        let s3 = Arc::new(storage().with_resources(&["logs"], "us-west-2"));
        let provider = authenticated(FakeConnector::new(vec![ec2.clone(), s3.clone()])).await;

        let inventory = assert_ok!(
            provider
                .get_resources(&ResourceFilters::default(), &CancellationToken::new())
                .await
        );

        let mut ids: Vec<&str> = inventory.resources.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["i-1", "i-2", "logs"]);
        assert!(inventory.warnings.is_empty());
        assert_eq!(ec2.calls(), 1);
        assert_eq!(s3.calls(), 1);
    }

    #[tokio::test]
    async fn test_collector_failure_becomes_warning() {
        let ec2 = Arc::new(compute().with_resources(&["i-1"], "us-east-1"));
        let s3 = Arc::new(storage().failing("AccessDenied: s3:ListAllMyBuckets"));
        let provider = authenticated(FakeConnector::new(vec![ec2, s3])).await;

        let inventory = assert_ok!(
            provider
                .get_resources(&ResourceFilters::default(), &CancellationToken::new())
                .await
        );

        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.warnings.len(), 1);
        assert_eq!(inventory.warnings[0].source, "s3");
        assert!(inventory.warnings[0].message.contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_kind_filter_skips_unrelated_collectors() {
        let ec2 = Arc::new(compute().with_resources(&["i-1"], "us-east-1"));
        let s3 = Arc::new(storage().with_resources(&["logs"], "us-east-1"));
        let provider = authenticated(FakeConnector::new(vec![ec2.clone(), s3.clone()])).await;

        let filters = ResourceFilters {
            kinds: vec!["S3".to_string()],
            ..Default::default()
        };
        let inventory = assert_ok!(provider.get_resources(&filters, &CancellationToken::new()).await);

        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.resources[0].kind, Kind::ObjectStorage);
        assert_eq!(ec2.calls(), 0, "compute collector should not be dispatched");
    }

    #[tokio::test]
    async fn test_cancellation_returns_promptly() {
        let slow = Arc::new(compute().slow(Duration::from_secs(60)));
        let provider = authenticated(FakeConnector::new(vec![slow])).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            provider.get_resources(&ResourceFilters::default(), &cancel),
        )
        .await
        .expect("cancellation should not wait for the collector");

        assert!(assert_err!(outcome).is_cancelled());
    }

    #[tokio::test]
    async fn test_get_resources_by_type() {
        let ec2 = Arc::new(compute().with_resources(&["i-1"], "us-east-1"));
        let s3 = Arc::new(storage().with_resources(&["logs"], "us-east-1"));
        let provider = authenticated(FakeConnector::new(vec![ec2.clone(), s3.clone()])).await;
        let cancel = CancellationToken::new();

        let inventory = assert_ok!(
            provider
                .get_resources_by_type("instances", &ResourceFilters::default(), &cancel)
                .await
        );
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.resources[0].id, "i-1");
        assert_eq!(s3.calls(), 0);

        let err = assert_err!(
            provider
                .get_resources_by_type("quantum", &ResourceFilters::default(), &cancel)
                .await
        );
        assert!(matches!(err, InventoryError::UnsupportedKind(ref k) if k == "quantum"));

        // Known kind, but no collector produces it
        let err = assert_err!(
            provider
                .get_resources_by_type("lambda", &ResourceFilters::default(), &cancel)
                .await
        );
        assert!(matches!(err, InventoryError::UnsupportedKind(_)));
    }

    #[tokio::test]
    async fn test_iam_term_covers_every_iam_kind() {
        let iam = Arc::new(identity());
        let ec2 = Arc::new(compute().with_resources(&["i-1"], "us-east-1"));
        let provider = authenticated(FakeConnector::new(vec![iam.clone(), ec2.clone()])).await;
        let cancel = CancellationToken::new();

        let filters = ResourceFilters {
            kinds: vec!["iam".to_string(), "vpc".to_string()],
            ..Default::default()
        };
        let inventory = assert_ok!(provider.get_resources(&filters, &cancel).await);
        assert_eq!(
            sorted_ids(&inventory),
            vec!["alice", "arn:aws:iam::123456789012:policy/ops", "deployer"]
        );
        assert_eq!(ec2.calls(), 0);

        // By type, the group term dispatches to users
        let inventory = assert_ok!(
            provider
                .get_resources_by_type("iam", &ResourceFilters::default(), &cancel)
                .await
        );
        assert_eq!(sorted_ids(&inventory), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_cluster_terms_return_clusters_only() {
        let rds = Arc::new(database());
        let provider = authenticated(FakeConnector::new(vec![rds])).await;
        let cancel = CancellationToken::new();

        for term in ["rds_cluster", "aurora"] {
            let inventory = assert_ok!(
                provider
                    .get_resources_by_type(term, &ResourceFilters::default(), &cancel)
                    .await
            );
            assert_eq!(sorted_ids(&inventory), vec!["aurora-main"], "term {term}");
        }

        let inventory = assert_ok!(
            provider
                .get_resources_by_type("rds_instance", &ResourceFilters::default(), &cancel)
                .await
        );
        assert_eq!(sorted_ids(&inventory), vec!["orders-db"]);

        let inventory = assert_ok!(
            provider
                .get_resources_by_type("rds", &ResourceFilters::default(), &cancel)
                .await
        );
        assert_eq!(sorted_ids(&inventory), vec!["aurora-main", "orders-db"]);
    }
}

// ============================================================================
// Authentication state machine
// ============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_unauthenticated_fails_fast() {
        let ec2 = Arc::new(compute().with_resources(&["i-1"], "us-east-1"));
        let provider = Provider::new(Arc::new(FakeConnector::new(vec![ec2.clone()])));
        let cancel = CancellationToken::new();

        assert_eq!(provider.state().await, AuthState::Unauthenticated);

        let err = assert_err!(provider.get_resources(&ResourceFilters::default(), &cancel).await);
        assert!(matches!(err, InventoryError::Unauthenticated { .. }));

        let err = assert_err!(provider.get_resource_status("i-1", &cancel).await);
        assert!(matches!(err, InventoryError::Unauthenticated { .. }));

        assert_eq!(ec2.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_authentication_is_sticky() {
        let connector = Arc::new(
            FakeConnector::new(vec![Arc::new(compute())])
                .rejecting("InvalidClientTokenId: The security token included in the request is invalid"),
        );
        let provider = Provider::new(connector.clone());
        let cancel = CancellationToken::new();

        let err = assert_err!(provider.authenticate(&aws_config(), &cancel).await);
        assert!(err.is_authentication());
        assert!(
            err.to_string().contains("The security token included in the request is invalid"),
            "source message must survive: {err}"
        );
        assert_eq!(provider.state().await, AuthState::AuthFailed);
        assert!(provider.auth_failure().await.unwrap().contains("InvalidClientTokenId"));

        let err = assert_err!(provider.authenticate(&aws_config(), &cancel).await);
        assert!(matches!(err, InventoryError::Unauthenticated { .. }));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1, "no retry after failure");
    }

    #[tokio::test]
    async fn test_repeat_authentication_is_noop() {
        let connector = Arc::new(FakeConnector::new(vec![Arc::new(compute())]));
        let provider = Provider::new(connector.clone());
        let cancel = CancellationToken::new();

        assert_ok!(provider.authenticate(&aws_config(), &cancel).await);
        assert_ok!(provider.authenticate(&aws_config(), &cancel).await);

        assert!(provider.is_authenticated().await);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// Status probes
// ============================================================================

mod status_tests {
    use super::*;

    #[tokio::test]
    async fn test_status_probes_in_order() {
        let ec2 = Arc::new(compute());
        let s3 = Arc::new(storage().knowing("logs"));
        let provider = authenticated(FakeConnector::new(vec![ec2.clone(), s3.clone()])).await;

        let status = assert_ok!(provider.get_resource_status("logs", &CancellationToken::new()).await);
        assert_eq!(status.state, "running");
        assert_eq!(ec2.calls(), 1);
        assert_eq!(s3.calls(), 1);
    }

    #[tokio::test]
    async fn test_status_not_found_and_empty_id() {
        let provider = authenticated(FakeConnector::new(vec![Arc::new(compute())])).await;
        let cancel = CancellationToken::new();

        let err = assert_err!(provider.get_resource_status("i-missing", &cancel).await);
        assert!(matches!(err, InventoryError::ResourceNotFound(ref id) if id == "i-missing"));

        let err = assert_err!(provider.get_resource_status("  ", &cancel).await);
        assert!(err.is_validation());
    }
}

// ============================================================================
// Registry and factory
// ============================================================================

mod registry_tests {
    use super::*;

    fn provider() -> Arc<Provider> {
        Arc::new(Provider::new(Arc::new(FakeConnector::new(vec![Arc::new(compute())]))))
    }

    #[tokio::test]
    async fn test_register_list_and_duplicates() {
        let registry = ProviderRegistry::new();
        assert_ok!(registry.register("zeta", provider()));
        assert_ok!(registry.register("alpha", provider()));

        let err = assert_err!(registry.register("alpha", provider()));
        assert!(matches!(err, InventoryError::AlreadyRegistered(ref n) if n == "alpha"));
        assert!(assert_err!(registry.register("", provider())).is_validation());

        assert_eq!(registry.list(), vec!["alpha", "zeta"]);
        assert_eq!(registry.count(), 2);
        assert!(registry.exists("zeta"));

        let info = assert_ok!(registry.info("alpha").await);
        assert!(!info.authenticated);
        assert_eq!(info.supported_kinds, vec![Kind::VirtualMachine]);

        assert_ok!(registry.unregister("zeta"));
        assert!(expect_err(registry.get("zeta")).is_not_found());
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown_provider() {
        let factory = ProviderFactory::new().with_connector(Arc::new(FakeConnector::new(vec![])));
        assert_eq!(factory.supported_providers(), vec!["aws"]);

        let err = expect_err(
            factory
                .create_provider("gcp", &aws_config(), &CancellationToken::new())
                .await,
        );
        assert!(matches!(err, InventoryError::UnsupportedProvider(ref n) if n == "gcp"));
    }

    #[tokio::test]
    async fn test_factory_validates_before_connecting() {
        let connector = Arc::new(FakeConnector::new(vec![]));
        let factory = ProviderFactory::new().with_connector(connector.clone());

        let bad = ProviderConfig::Aws(AwsConfig {
            duration_seconds: Some(10),
            ..Default::default()
        });
        let err = expect_err(factory.create_provider("aws", &bad, &CancellationToken::new()).await);
        assert!(err.is_validation());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_enabled_registers_and_reports_failures() {
        let cancel = CancellationToken::new();
        let config = Config::default();

        let ok = ProviderFactory::new().with_connector(Arc::new(FakeConnector::new(vec![Arc::new(compute())])));
        let registry = ProviderRegistry::new();
        assert!(ok.create_enabled(&config, &registry, &cancel).await.is_empty());
        assert_eq!(registry.list(), vec!["aws"]);
        assert!(assert_ok!(registry.info("aws").await).authenticated);

        let failing = ProviderFactory::new()
            .with_connector(Arc::new(FakeConnector::new(vec![]).rejecting("ExpiredToken: expired")));
        let registry = ProviderRegistry::new();
        let failures = failing.create_enabled(&config, &registry, &cancel).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].1.to_string().contains("ExpiredToken: expired"));
        assert_eq!(registry.count(), 0);

        let mut disabled = Config::default();
        disabled.providers.aws.enabled = false;
        let registry = ProviderRegistry::new();
        assert!(failing.create_enabled(&disabled, &registry, &cancel).await.is_empty());
        assert_eq!(registry.count(), 0);
    }
}
