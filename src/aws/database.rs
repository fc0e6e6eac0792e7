//! RDS instances and clusters -> database

use super::client::AwsClient;
use super::error::AwsError;
use super::tags::{display_name, rds_tags, timestamp};
use crate::error::InventoryError;
use crate::provider::{Collection, Collector};
use crate::resource::{
    cancellable, collect_regions, resolve_regions, Kind, Resource, ResourceFilters, ResourceStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_rds::types::{DbCluster, DbInstance};
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub struct DatabaseCollector {
    client: AwsClient,
}

impl DatabaseCollector {
    pub const KINDS: &'static [Kind] = &[Kind::Database];

    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn list_instances(&self, region: String) -> Result<Vec<Resource>> {
        let rds = self.client.rds(&region);
        let mut pages = rds.describe_db_instances().into_paginator().send();
        let mut resources = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("DescribeDBInstances")?;
            resources.extend(
                page.db_instances()
                    .iter()
                    .filter_map(|db| instance_to_resource(db, &region)),
            );
        }

        Ok(resources)
    }

    async fn list_clusters(&self, region: String) -> Result<Vec<Resource>> {
        let rds = self.client.rds(&region);
        let mut pages = rds.describe_db_clusters().into_paginator().send();
        let mut resources = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("DescribeDBClusters")?;
            resources.extend(
                page.db_clusters()
                    .iter()
                    .filter_map(|cluster| cluster_to_resource(cluster, &region)),
            );
        }

        Ok(resources)
    }

    async fn probe_region(&self, id: &str, region: &str) -> Result<Option<ResourceStatus>> {
        let rds = self.client.rds(region);

        match rds.describe_db_instances().db_instance_identifier(id).send().await {
            Ok(output) => {
                if let Some(r) = output.db_instances().iter().find_map(|db| instance_to_resource(db, region)) {
                    return Ok(Some(r.status));
                }
            }
            Err(e) => {
                let err = AwsError::from_sdk(&e);
                if !err.is_not_found() {
                    return Err(anyhow::Error::new(err).context("DescribeDBInstances"));
                }
            }
        }

        match rds.describe_db_clusters().db_cluster_identifier(id).send().await {
            Ok(output) => Ok(output
                .db_clusters()
                .iter()
                .find_map(|c| cluster_to_resource(c, region))
                .map(|r| r.status)),
            Err(e) => {
                let err = AwsError::from_sdk(&e);
                if err.is_not_found() {
                    Ok(None)
                } else {
                    Err(anyhow::Error::new(err).context("DescribeDBClusters"))
                }
            }
        }
    }
}

/// Normalize one DB instance; tagged with `resource_subtype = "instance"`
pub fn instance_to_resource(db: &DbInstance, region: &str) -> Option<Resource> {
    let id = db.db_instance_identifier().filter(|id| !id.is_empty())?;
    let tags = rds_tags(db.tag_list());

    let mut resource = Resource::new(id, display_name(&tags, id), Kind::Database, "aws", region)
        .with_state(db.db_instance_status().unwrap_or("unknown"))
        .with_created_at(db.instance_create_time().and_then(timestamp))
        .with_tags(tags);

    resource.set_metadata("resource_subtype", json!("instance"));
    resource.set_metadata("arn", db.db_instance_arn().map(|v| json!(v)));
    resource.set_metadata("engine", db.engine().map(|v| json!(v)));
    resource.set_metadata("engine_version", db.engine_version().map(|v| json!(v)));
    resource.set_metadata("instance_class", db.db_instance_class().map(|v| json!(v)));
    resource.set_metadata("allocated_storage_gb", db.allocated_storage().map(|v| json!(v)));
    resource.set_metadata("storage_type", db.storage_type().map(|v| json!(v)));
    resource.set_metadata("storage_encrypted", db.storage_encrypted().map(|v| json!(v)));
    resource.set_metadata("multi_az", db.multi_az().map(|v| json!(v)));
    resource.set_metadata("publicly_accessible", db.publicly_accessible().map(|v| json!(v)));
    resource.set_metadata("availability_zone", db.availability_zone().map(|v| json!(v)));
    resource.set_metadata("cluster_id", db.db_cluster_identifier().map(|v| json!(v)));
    if let Some(endpoint) = db.endpoint() {
        resource.set_metadata(
            "endpoint",
            json!({"address": endpoint.address(), "port": endpoint.port()}),
        );
    }

    Some(resource)
}

/// Normalize one DB cluster; tagged with `resource_subtype = "cluster"`
pub fn cluster_to_resource(cluster: &DbCluster, region: &str) -> Option<Resource> {
    let id = cluster.db_cluster_identifier().filter(|id| !id.is_empty())?;
    let tags = rds_tags(cluster.tag_list());

    let mut resource = Resource::new(id, display_name(&tags, id), Kind::Database, "aws", region)
        .with_state(cluster.status().unwrap_or("unknown"))
        .with_created_at(cluster.cluster_create_time().and_then(timestamp))
        .with_tags(tags);

    let members: Vec<_> = cluster
        .db_cluster_members()
        .iter()
        .map(|m| json!({"id": m.db_instance_identifier(), "writer": m.is_cluster_writer()}))
        .collect();

    resource.set_metadata("resource_subtype", json!("cluster"));
    resource.set_metadata("arn", cluster.db_cluster_arn().map(|v| json!(v)));
    resource.set_metadata("engine", cluster.engine().map(|v| json!(v)));
    resource.set_metadata("engine_version", cluster.engine_version().map(|v| json!(v)));
    resource.set_metadata("engine_mode", cluster.engine_mode().map(|v| json!(v)));
    resource.set_metadata("endpoint", cluster.endpoint().map(|v| json!(v)));
    resource.set_metadata("reader_endpoint", cluster.reader_endpoint().map(|v| json!(v)));
    resource.set_metadata("port", cluster.port().map(|v| json!(v)));
    resource.set_metadata("multi_az", cluster.multi_az().map(|v| json!(v)));
    resource.set_metadata("storage_encrypted", cluster.storage_encrypted().map(|v| json!(v)));
    resource.set_metadata("availability_zones", json!(cluster.availability_zones()));
    resource.set_metadata("members", json!(members));

    Some(resource)
}

#[async_trait]
impl Collector for DatabaseCollector {
    fn name(&self) -> &'static str {
        "rds"
    }

    fn kinds(&self) -> &'static [Kind] {
        Self::KINDS
    }

    async fn collect(
        &self,
        filters: &ResourceFilters,
        cancel: &CancellationToken,
    ) -> Result<Collection, InventoryError> {
        let regions = resolve_regions(filters, self.client.settings());

        let mut collection =
            collect_regions(self.name(), &regions, cancel, |region| self.list_instances(region))
                .await?;
        collection.extend(
            collect_regions(self.name(), &regions, cancel, |region| self.list_clusters(region))
                .await?,
        );

        collection.resources.retain(|r| filters.matches(r));
        Ok(collection)
    }

    async fn status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError> {
        let regions = resolve_regions(&ResourceFilters::default(), self.client.settings());
        for region in regions {
            match cancellable(cancel, self.probe_region(id, &region)).await? {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(region = %region, id, "RDS status probe failed: {:#}", err);
                }
            }
        }
        Ok(None)
    }
}
