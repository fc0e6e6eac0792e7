//! VPCs and security groups

use super::client::AwsClient;
use super::error::AwsError;
use super::tags::{display_name, ec2_tags};
use crate::error::InventoryError;
use crate::provider::{Collection, Collector};
use crate::resource::{
    cancellable, collect_regions, resolve_regions, Kind, Resource, ResourceFilters, ResourceStatus,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_ec2::types::{IpPermission, SecurityGroup, Vpc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub struct NetworkCollector {
    client: AwsClient,
}

impl NetworkCollector {
    pub const KINDS: &'static [Kind] = &[Kind::Vpc, Kind::SecurityGroup];

    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn list_vpcs(&self, region: String) -> Result<Vec<Resource>> {
        let ec2 = self.client.ec2(&region);
        let mut pages = ec2.describe_vpcs().into_paginator().send();
        let mut resources = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("DescribeVpcs")?;
            resources.extend(page.vpcs().iter().filter_map(|v| vpc_to_resource(v, &region)));
        }

        Ok(resources)
    }

    async fn list_security_groups(&self, region: String) -> Result<Vec<Resource>> {
        let ec2 = self.client.ec2(&region);
        let mut pages = ec2.describe_security_groups().into_paginator().send();
        let mut resources = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("DescribeSecurityGroups")?;
            resources.extend(
                page.security_groups()
                    .iter()
                    .filter_map(|g| security_group_to_resource(g, &region)),
            );
        }

        Ok(resources)
    }

    async fn probe_region(&self, id: &str, region: &str) -> Result<Option<ResourceStatus>> {
        let ec2 = self.client.ec2(region);

        let found = if id.starts_with("vpc-") {
            ec2.describe_vpcs()
                .vpc_ids(id)
                .send()
                .await
                .map(|out| out.vpcs().iter().find_map(|v| vpc_to_resource(v, region)))
                .map_err(|e| AwsError::from_sdk(&e))
        } else {
            ec2.describe_security_groups()
                .group_ids(id)
                .send()
                .await
                .map(|out| {
                    out.security_groups()
                        .iter()
                        .find_map(|g| security_group_to_resource(g, region))
                })
                .map_err(|e| AwsError::from_sdk(&e))
        };

        match found {
            Ok(resource) => Ok(resource.map(|r| r.status)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(anyhow::Error::new(err).context("network status probe")),
        }
    }
}

pub fn vpc_to_resource(vpc: &Vpc, region: &str) -> Option<Resource> {
    let id = vpc.vpc_id().filter(|id| !id.is_empty())?;
    let tags = ec2_tags(vpc.tags());
    let state = vpc.state().map(|s| s.as_str()).unwrap_or("unknown");

    let mut resource = Resource::new(id, display_name(&tags, id), Kind::Vpc, "aws", region)
        .with_state(state)
        .with_tags(tags);

    let ipv6: Vec<&str> = vpc
        .ipv6_cidr_block_association_set()
        .iter()
        .filter_map(|a| a.ipv6_cidr_block())
        .collect();

    resource.set_metadata("cidr_block", vpc.cidr_block().map(|v| json!(v)));
    resource.set_metadata("dhcp_options_id", vpc.dhcp_options_id().map(|v| json!(v)));
    resource.set_metadata("instance_tenancy", vpc.instance_tenancy().map(|t| json!(t.as_str())));
    resource.set_metadata("is_default", vpc.is_default().map(|v| json!(v)));
    resource.set_metadata("owner_id", vpc.owner_id().map(|v| json!(v)));
    resource.set_metadata("ipv6_cidr_blocks", json!(ipv6));

    Some(resource)
}

/// Security groups have no lifecycle state; they are "available" while listed
pub fn security_group_to_resource(group: &SecurityGroup, region: &str) -> Option<Resource> {
    let id = group.group_id().filter(|id| !id.is_empty())?;
    let tags = ec2_tags(group.tags());
    let fallback = group.group_name().unwrap_or(id);

    let mut resource = Resource::new(
        id,
        display_name(&tags, fallback),
        Kind::SecurityGroup,
        "aws",
        region,
    )
    .with_state("available")
    .with_tags(tags);

    resource.set_metadata("group_name", group.group_name().map(|v| json!(v)));
    resource.set_metadata("description", group.description().map(|v| json!(v)));
    resource.set_metadata("vpc_id", group.vpc_id().map(|v| json!(v)));
    resource.set_metadata("owner_id", group.owner_id().map(|v| json!(v)));
    resource.set_metadata("ingress_rules", rules(group.ip_permissions()));
    resource.set_metadata("egress_rules", rules(group.ip_permissions_egress()));

    Some(resource)
}

fn rules(permissions: &[IpPermission]) -> Value {
    let rules: Vec<Value> = permissions
        .iter()
        .map(|p| {
            let mut sources: Vec<&str> = p.ip_ranges().iter().filter_map(|r| r.cidr_ip()).collect();
            sources.extend(p.ipv6_ranges().iter().filter_map(|r| r.cidr_ipv6()));
            sources.extend(p.user_id_group_pairs().iter().filter_map(|g| g.group_id()));
            json!({
                "protocol": p.ip_protocol(),
                "from_port": p.from_port(),
                "to_port": p.to_port(),
                "sources": sources,
            })
        })
        .collect();
    json!(rules)
}

#[async_trait]
impl Collector for NetworkCollector {
    fn name(&self) -> &'static str {
        "vpc"
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
        let mut collection = Collection::default();

        if filters.accepts_kind(Kind::Vpc) {
            collection.extend(
                collect_regions(self.name(), &regions, cancel, |region| self.list_vpcs(region))
                    .await?,
            );
        }
        if filters.accepts_kind(Kind::SecurityGroup) {
            collection.extend(
                collect_regions(self.name(), &regions, cancel, |region| {
                    self.list_security_groups(region)
                })
                .await?,
            );
        }

        collection.resources.retain(|r| filters.matches(r));
        Ok(collection)
    }

    async fn status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError> {
        if !id.starts_with("vpc-") && !id.starts_with("sg-") {
            return Ok(None);
        }

        let regions = resolve_regions(&ResourceFilters::default(), self.client.settings());
        for region in regions {
            match cancellable(cancel, self.probe_region(id, &region)).await? {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(region = %region, id, "Network status probe failed: {:#}", err);
                }
            }
        }
        Ok(None)
    }
}
