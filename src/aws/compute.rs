//! EC2 instances -> virtual_machine

use super::client::AwsClient;
use super::error::AwsError;
use super::tags::{display_name, ec2_tags, timestamp};
use crate::error::InventoryError;
use crate::provider::{Collection, Collector};
use crate::resource::{
    cancellable, collect_regions, resolve_regions, Kind, Resource, ResourceFilters, ResourceStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::Instance;
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub struct ComputeCollector {
    client: AwsClient,
}

impl ComputeCollector {
    pub const KINDS: &'static [Kind] = &[Kind::VirtualMachine];

    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn list_region(&self, region: String) -> Result<Vec<Resource>> {
        let ec2 = self.client.ec2(&region);
        let mut pages = ec2.describe_instances().into_paginator().send();
        let mut resources = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("DescribeInstances")?;
            for reservation in page.reservations() {
                resources.extend(
                    reservation
                        .instances()
                        .iter()
                        .filter_map(|i| instance_to_resource(i, &region)),
                );
            }
        }

        Ok(resources)
    }
}

/// Normalize one instance. Instances without an id are skipped.
pub fn instance_to_resource(instance: &Instance, region: &str) -> Option<Resource> {
    let id = instance.instance_id().filter(|id| !id.is_empty())?;
    let tags = ec2_tags(instance.tags());
    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|n| n.as_str())
        .unwrap_or("unknown");

    let mut resource = Resource::new(
        id,
        display_name(&tags, id),
        Kind::VirtualMachine,
        "aws",
        region,
    )
    .with_state(state)
    .with_created_at(instance.launch_time().and_then(timestamp))
    .with_tags(tags);

    let platform = instance
        .platform()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "linux".to_string());
    let security_groups: Vec<_> = instance
        .security_groups()
        .iter()
        .map(|g| json!({"id": g.group_id(), "name": g.group_name()}))
        .collect();

    resource.set_metadata("instance_type", instance.instance_type().map(|t| json!(t.as_str())));
    resource.set_metadata("platform", json!(platform));
    resource.set_metadata("vpc_id", instance.vpc_id().map(|v| json!(v)));
    resource.set_metadata("subnet_id", instance.subnet_id().map(|v| json!(v)));
    resource.set_metadata(
        "availability_zone",
        instance
            .placement()
            .and_then(|p| p.availability_zone())
            .map(|v| json!(v)),
    );
    resource.set_metadata("public_ip", instance.public_ip_address().map(|v| json!(v)));
    resource.set_metadata("private_ip", instance.private_ip_address().map(|v| json!(v)));
    resource.set_metadata("image_id", instance.image_id().map(|v| json!(v)));
    resource.set_metadata("key_name", instance.key_name().map(|v| json!(v)));
    resource.set_metadata("security_groups", json!(security_groups));

    Some(resource)
}

#[async_trait]
impl Collector for ComputeCollector {
    fn name(&self) -> &'static str {
        "ec2"
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
            collect_regions(self.name(), &regions, cancel, |region| self.list_region(region)).await?;

        collection.resources.retain(|r| filters.matches(r));
        Ok(collection)
    }

    async fn status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError> {
        if !id.starts_with("i-") {
            return Ok(None);
        }

        let regions = resolve_regions(&ResourceFilters::default(), self.client.settings());
        for region in regions {
            let ec2 = self.client.ec2(&region);
            let outcome = cancellable(cancel, ec2.describe_instances().instance_ids(id).send()).await?;

            let output = match outcome {
                Ok(output) => output,
                Err(e) => {
                    let err = AwsError::from_sdk(&e);
                    if !err.is_not_found() {
                        tracing::debug!(region = %region, id, "DescribeInstances failed: {}", err);
                    }
                    continue;
                }
            };

            let found = output
                .reservations()
                .iter()
                .flat_map(|r| r.instances())
                .find_map(|i| instance_to_resource(i, &region));
            if let Some(resource) = found {
                return Ok(Some(resource.status));
            }
        }

        Ok(None)
    }
}
