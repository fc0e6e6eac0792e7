//! S3 buckets -> object_storage
//!
//! ListBuckets is global, so this collector does not walk regions. Each
//! bucket's region comes from GetBucketLocation and the remaining detail
//! calls go to a client in that region. Detail calls are best-effort: a
//! failure drops the metadata key, never the bucket. A failed location
//! lookup falls back to the home region and marks `region_source`.

use super::client::AwsClient;
use super::error::AwsError;
use super::tags::{display_name, s3_tags, timestamp};
use crate::error::InventoryError;
use crate::provider::{Collection, Collector, Warning};
use crate::resource::{cancellable, Kind, Resource, ResourceFilters, ResourceStatus};
use async_trait::async_trait;
use aws_sdk_s3::operation::get_bucket_notification_configuration::GetBucketNotificationConfigurationOutput;
use aws_sdk_s3::operation::get_bucket_versioning::GetBucketVersioningOutput;
use aws_sdk_s3::types::{Bucket, PublicAccessBlockConfiguration, ServerSideEncryptionConfiguration};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Concurrent per-bucket detail lookups
const ENRICH_CONCURRENCY: usize = 8;

const NO_ENCRYPTION_CODE: &str = "ServerSideEncryptionConfigurationNotFoundError";

pub struct StorageCollector {
    client: AwsClient,
}

impl StorageCollector {
    pub const KINDS: &'static [Kind] = &[Kind::ObjectStorage];

    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn bucket_location(&self, s3: &aws_sdk_s3::Client, bucket: &str) -> Result<String, AwsError> {
        s3.get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map(|output| normalize_location(output.location_constraint().map(|c| c.as_str())))
            .map_err(|e| AwsError::from_sdk(&e))
    }

    /// Build one bucket resource. `None` when the bucket falls outside the
    /// region filter, so no detail calls are spent on it.
    async fn describe_bucket(&self, bucket: &Bucket, filters: &ResourceFilters) -> Option<Resource> {
        let name = bucket.name().filter(|n| !n.is_empty())?;
        let home_region = self.client.home_region();
        let home = self.client.s3(&home_region);
        let located = self.bucket_location(&home, name).await;
        let (region, region_source) = match located {
            Ok(region) => (region, "location"),
            Err(err) => {
                tracing::debug!(bucket = name, "GetBucketLocation failed, using {}: {}", home_region, err);
                (home_region, "fallback")
            }
        };
        if !filters.accepts_region(&region) {
            return None;
        }

        let s3 = self.client.s3(&region);

        let (tags, encryption, versioning, public_access, notification) = tokio::join!(
            s3.get_bucket_tagging().bucket(name).send(),
            s3.get_bucket_encryption().bucket(name).send(),
            s3.get_bucket_versioning().bucket(name).send(),
            s3.get_public_access_block().bucket(name).send(),
            s3.get_bucket_notification_configuration().bucket(name).send(),
        );

        let tags = match tags {
            Ok(output) => s3_tags(output.tag_set()),
            Err(e) => {
                tracing::debug!(bucket = name, "GetBucketTagging skipped: {}", AwsError::from_sdk(&e));
                BTreeMap::new()
            }
        };

        let mut resource = Resource::new(
            name,
            display_name(&tags, name),
            Kind::ObjectStorage,
            "aws",
            region,
        )
        .with_state("available")
        .with_created_at(bucket.creation_date().and_then(timestamp))
        .with_tags(tags);

        resource.set_metadata("service", json!("s3"));
        resource.set_metadata("bucket_name", json!(name));
        resource.set_metadata("region_source", json!(region_source));

        match encryption {
            Ok(output) => resource.set_metadata(
                "encryption",
                output.server_side_encryption_configuration().map(encryption_summary),
            ),
            Err(e) => {
                let err = AwsError::from_sdk(&e);
                if err.code() == Some(NO_ENCRYPTION_CODE) {
                    resource.set_metadata("encryption", json!({"enabled": false}));
                } else {
                    tracing::debug!(bucket = name, "GetBucketEncryption skipped: {}", err);
                }
            }
        }

        match versioning {
            Ok(output) => resource.set_metadata("versioning", versioning_summary(&output)),
            Err(e) => {
                tracing::debug!(bucket = name, "GetBucketVersioning skipped: {}", AwsError::from_sdk(&e));
            }
        }

        match public_access {
            Ok(output) => resource.set_metadata(
                "public_access_block",
                output
                    .public_access_block_configuration()
                    .map(public_access_summary),
            ),
            Err(e) => {
                tracing::debug!(bucket = name, "GetPublicAccessBlock skipped: {}", AwsError::from_sdk(&e));
            }
        }

        match notification {
            Ok(output) => resource.set_metadata("notifications", notification_summary(&output)),
            Err(e) => {
                tracing::debug!(
                    bucket = name,
                    "GetBucketNotificationConfiguration skipped: {}",
                    AwsError::from_sdk(&e)
                );
            }
        }

        Some(resource)
    }
}

/// Map a LocationConstraint to a region name.
///
/// An empty constraint means us-east-1; "EU" is the legacy name for eu-west-1.
pub fn normalize_location(constraint: Option<&str>) -> String {
    match constraint.unwrap_or_default() {
        "" => "us-east-1".to_string(),
        "EU" => "eu-west-1".to_string(),
        other => other.to_string(),
    }
}

fn encryption_summary(config: &ServerSideEncryptionConfiguration) -> Value {
    let rules: Vec<Value> = config
        .rules()
        .iter()
        .filter_map(|rule| rule.apply_server_side_encryption_by_default())
        .map(|default| {
            json!({
                "algorithm": default.sse_algorithm().as_str(),
                "kms_key_id": default.kms_master_key_id(),
            })
        })
        .collect();

    json!({"enabled": !rules.is_empty(), "rules": rules})
}

fn versioning_summary(output: &GetBucketVersioningOutput) -> Value {
    json!({
        "status": output.status().map(|s| s.as_str()).unwrap_or("Disabled"),
        "mfa_delete": output.mfa_delete().map(|s| s.as_str()),
    })
}

fn public_access_summary(config: &PublicAccessBlockConfiguration) -> Value {
    json!({
        "block_public_acls": config.block_public_acls(),
        "ignore_public_acls": config.ignore_public_acls(),
        "block_public_policy": config.block_public_policy(),
        "restrict_public_buckets": config.restrict_public_buckets(),
    })
}

/// Count configured targets per destination type
fn notification_summary(output: &GetBucketNotificationConfigurationOutput) -> Value {
    let topics = output.topic_configurations().len();
    let queues = output.queue_configurations().len();
    let lambdas = output.lambda_function_configurations().len();
    let event_bridge = output.event_bridge_configuration().is_some();

    json!({
        "configured": topics + queues + lambdas > 0 || event_bridge,
        "topic_configurations": topics,
        "queue_configurations": queues,
        "lambda_configurations": lambdas,
        "event_bridge": event_bridge,
    })
}

/// Cheap pre-check so status probes skip ids that cannot name a bucket
fn is_bucket_name(id: &str) -> bool {
    (3..=63).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

#[async_trait]
impl Collector for StorageCollector {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn kinds(&self) -> &'static [Kind] {
        Self::KINDS
    }

    async fn collect(
        &self,
        filters: &ResourceFilters,
        cancel: &CancellationToken,
    ) -> Result<Collection, InventoryError> {
        let home = self.client.home_region();
        let s3 = self.client.s3(&home);

        let listed = match cancellable(cancel, s3.list_buckets().send()).await? {
            Ok(output) => output,
            Err(e) => {
                let err = AwsError::from_sdk(&e);
                tracing::warn!(collector = self.name(), "ListBuckets failed: {}", err);
                return Ok(Collection {
                    resources: Vec::new(),
                    warnings: vec![Warning::new(
                        self.name(),
                        None,
                        format!("ListBuckets: {}", err),
                    )],
                });
            }
        };

        tracing::debug!(buckets = listed.buckets().len(), "Listed buckets");

        let described: Vec<Option<Resource>> = cancellable(
            cancel,
            stream::iter(listed.buckets())
                .map(|bucket| self.describe_bucket(bucket, filters))
                .buffered(ENRICH_CONCURRENCY)
                .collect(),
        )
        .await?;

        let resources = described
            .into_iter()
            .flatten()
            .filter(|r| filters.matches(r))
            .collect();

        Ok(Collection {
            resources,
            warnings: Vec::new(),
        })
    }

    async fn status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError> {
        if !is_bucket_name(id) {
            return Ok(None);
        }

        // HeadBucket must reach the bucket's own region
        let home_region = self.client.home_region();
        let home = self.client.s3(&home_region);
        let region = match cancellable(cancel, self.bucket_location(&home, id)).await? {
            Ok(region) => region,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => {
                tracing::debug!(bucket = id, "GetBucketLocation failed, using {}: {}", home_region, err);
                home_region
            }
        };

        let s3 = self.client.s3(&region);
        match cancellable(cancel, s3.head_bucket().bucket(id).send()).await? {
            Ok(_) => Ok(Some(ResourceStatus::observed(Kind::ObjectStorage, "available"))),
            Err(e) => {
                let err = AwsError::from_sdk(&e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(anyhow::Error::new(err).context("HeadBucket").into())
                }
            }
        }
    }
}
