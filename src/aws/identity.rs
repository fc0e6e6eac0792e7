//! IAM users, roles and customer-managed policies
//!
//! IAM is global: everything is reported with region `global` and is only
//! collected when the region filter admits it.

use super::client::AwsClient;
use super::error::AwsError;
use super::tags::{iam_tags, timestamp};
use crate::error::InventoryError;
use crate::provider::{Collection, Collector};
use crate::resource::{
    cancellable, collect_regions, Kind, Resource, ResourceFilters, ResourceStatus, GLOBAL_REGION,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_iam::types::{Policy, PolicyScopeType, Role, User};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Concurrent per-principal detail lookups
const ENRICH_CONCURRENCY: usize = 8;

const IAM_STATE: &str = "active";

pub struct IdentityCollector {
    client: AwsClient,
}

impl IdentityCollector {
    pub const KINDS: &'static [Kind] = &[Kind::IamUser, Kind::IamRole, Kind::IamPolicy];

    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    async fn list_users(&self) -> Result<Vec<Resource>> {
        let iam = self.client.iam();
        let mut pages = iam.list_users().into_paginator().send();
        let mut users = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("ListUsers")?;
            users.extend(page.users().iter().cloned());
        }

        let resources = stream::iter(users.iter())
            .map(|user| self.describe_user(&iam, user))
            .buffered(ENRICH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;
        Ok(resources)
    }

    async fn describe_user(&self, iam: &aws_sdk_iam::Client, user: &User) -> Resource {
        let name = user.user_name();
        let mut resource = user_to_resource(user);

        let (attached, inline, groups, keys, tags) = tokio::join!(
            iam.list_attached_user_policies().user_name(name).send(),
            iam.list_user_policies().user_name(name).send(),
            iam.list_groups_for_user().user_name(name).send(),
            iam.list_access_keys().user_name(name).send(),
            iam.list_user_tags().user_name(name).send(),
        );

        let mut policies: Vec<String> = Vec::new();
        match attached {
            Ok(out) => policies.extend(
                out.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_name())
                    .map(str::to_string),
            ),
            Err(e) => tracing::debug!(user = name, "ListAttachedUserPolicies skipped: {}", AwsError::from_sdk(&e)),
        }
        match inline {
            Ok(out) => policies.extend(out.policy_names().iter().map(|p| format!("{} (inline)", p))),
            Err(e) => tracing::debug!(user = name, "ListUserPolicies skipped: {}", AwsError::from_sdk(&e)),
        }
        resource.set_metadata("policies", json!(policies));

        match groups {
            Ok(out) => {
                let names: Vec<&str> = out.groups().iter().map(|g| g.group_name()).collect();
                resource.set_metadata("groups", json!(names));
            }
            Err(e) => tracing::debug!(user = name, "ListGroupsForUser skipped: {}", AwsError::from_sdk(&e)),
        }

        match keys {
            Ok(out) => {
                let keys: Vec<_> = out
                    .access_key_metadata()
                    .iter()
                    .map(|k| {
                        json!({
                            "id": k.access_key_id(),
                            "status": k.status().map(|s| s.as_str()),
                            "created_at": k.create_date().and_then(timestamp),
                        })
                    })
                    .collect();
                resource.set_metadata("access_keys", json!(keys));
            }
            Err(e) => tracing::debug!(user = name, "ListAccessKeys skipped: {}", AwsError::from_sdk(&e)),
        }

        match tags {
            Ok(out) => resource.tags = iam_tags(out.tags()),
            Err(e) => tracing::debug!(user = name, "ListUserTags skipped: {}", AwsError::from_sdk(&e)),
        }

        resource
    }

    async fn list_roles(&self) -> Result<Vec<Resource>> {
        let iam = self.client.iam();
        let mut pages = iam.list_roles().into_paginator().send();
        let mut roles = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("ListRoles")?;
            roles.extend(page.roles().iter().cloned());
        }

        let resources = stream::iter(roles.iter())
            .map(|role| self.describe_role(&iam, role))
            .buffered(ENRICH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;
        Ok(resources)
    }

    async fn describe_role(&self, iam: &aws_sdk_iam::Client, role: &Role) -> Resource {
        let name = role.role_name();
        let mut resource = role_to_resource(role);

        let (attached, inline, tags) = tokio::join!(
            iam.list_attached_role_policies().role_name(name).send(),
            iam.list_role_policies().role_name(name).send(),
            iam.list_role_tags().role_name(name).send(),
        );

        let mut policies: Vec<String> = Vec::new();
        match attached {
            Ok(out) => policies.extend(
                out.attached_policies()
                    .iter()
                    .filter_map(|p| p.policy_name())
                    .map(str::to_string),
            ),
            Err(e) => tracing::debug!(role = name, "ListAttachedRolePolicies skipped: {}", AwsError::from_sdk(&e)),
        }
        match inline {
            Ok(out) => policies.extend(out.policy_names().iter().map(|p| format!("{} (inline)", p))),
            Err(e) => tracing::debug!(role = name, "ListRolePolicies skipped: {}", AwsError::from_sdk(&e)),
        }
        resource.set_metadata("policies", json!(policies));

        match tags {
            Ok(out) => resource.tags = iam_tags(out.tags()),
            Err(e) => tracing::debug!(role = name, "ListRoleTags skipped: {}", AwsError::from_sdk(&e)),
        }

        resource
    }

    async fn list_policies(&self) -> Result<Vec<Resource>> {
        let iam = self.client.iam();
        let mut pages = iam
            .list_policies()
            .scope(PolicyScopeType::Local)
            .into_paginator()
            .send();
        let mut resources = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| AwsError::from_sdk(&e))
                .context("ListPolicies")?;
            resources.extend(page.policies().iter().filter_map(policy_to_resource));
        }

        Ok(resources)
    }

    async fn probe(&self, id: &str) -> Result<Option<ResourceStatus>> {
        let iam = self.client.iam();

        if id.starts_with("arn:") {
            if !id.contains(":policy/") {
                return Ok(None);
            }
            return match iam.get_policy().policy_arn(id).send().await {
                Ok(out) => Ok(out.policy().and_then(policy_to_resource).map(|r| r.status)),
                Err(e) => not_found_as_none(AwsError::from_sdk(&e), "GetPolicy"),
            };
        }

        match iam.get_user().user_name(id).send().await {
            Ok(out) => return Ok(out.user().map(|u| user_to_resource(u).status)),
            Err(e) => {
                let err = AwsError::from_sdk(&e);
                if !err.is_not_found() {
                    return Err(anyhow::Error::new(err).context("GetUser"));
                }
            }
        }

        match iam.get_role().role_name(id).send().await {
            Ok(out) => Ok(out.role().map(|r| role_to_resource(r).status)),
            Err(e) => not_found_as_none(AwsError::from_sdk(&e), "GetRole"),
        }
    }
}

fn not_found_as_none(err: AwsError, operation: &'static str) -> Result<Option<ResourceStatus>> {
    if err.is_not_found() {
        Ok(None)
    } else {
        Err(anyhow::Error::new(err).context(operation))
    }
}

/// Base user record; ids are user names
pub fn user_to_resource(user: &User) -> Resource {
    let mut resource = Resource::new(
        user.user_name(),
        user.user_name(),
        Kind::IamUser,
        "aws",
        GLOBAL_REGION,
    )
    .with_state(IAM_STATE)
    .with_created_at(timestamp(user.create_date()))
    .with_tags(iam_tags(user.tags()));

    resource.set_metadata("arn", json!(user.arn()));
    resource.set_metadata("user_id", json!(user.user_id()));
    resource.set_metadata("path", json!(user.path()));
    resource.set_metadata(
        "password_last_used",
        user.password_last_used().and_then(timestamp).map(|t| json!(t)),
    );
    resource
}

/// Base role record; ids are role names
pub fn role_to_resource(role: &Role) -> Resource {
    let mut resource = Resource::new(
        role.role_name(),
        role.role_name(),
        Kind::IamRole,
        "aws",
        GLOBAL_REGION,
    )
    .with_state(IAM_STATE)
    .with_created_at(timestamp(role.create_date()))
    .with_tags(iam_tags(role.tags()));

    resource.set_metadata("arn", json!(role.arn()));
    resource.set_metadata("role_id", json!(role.role_id()));
    resource.set_metadata("path", json!(role.path()));
    resource.set_metadata("description", role.description().map(|v| json!(v)));
    resource.set_metadata("max_session_duration", role.max_session_duration().map(|v| json!(v)));
    resource
}

/// Customer-managed policy; ids are ARNs
pub fn policy_to_resource(policy: &Policy) -> Option<Resource> {
    let arn = policy.arn().filter(|a| !a.is_empty())?;
    let name = policy.policy_name().unwrap_or_default();

    let mut resource = Resource::new(arn, name, Kind::IamPolicy, "aws", GLOBAL_REGION)
        .with_state(IAM_STATE)
        .with_created_at(policy.create_date().and_then(timestamp))
        .with_tags(iam_tags(policy.tags()));

    resource.set_metadata("policy_id", policy.policy_id().map(|v| json!(v)));
    resource.set_metadata("path", policy.path().map(|v| json!(v)));
    resource.set_metadata("default_version", policy.default_version_id().map(|v| json!(v)));
    resource.set_metadata("attachment_count", policy.attachment_count().map(|v| json!(v)));
    Some(resource)
}

#[async_trait]
impl Collector for IdentityCollector {
    fn name(&self) -> &'static str {
        "iam"
    }

    fn kinds(&self) -> &'static [Kind] {
        Self::KINDS
    }

    async fn collect(
        &self,
        filters: &ResourceFilters,
        cancel: &CancellationToken,
    ) -> Result<Collection, InventoryError> {
        let mut collection = Collection::default();
        if !filters.accepts_region(GLOBAL_REGION) {
            tracing::debug!("Region filter excludes global IAM resources");
            return Ok(collection);
        }

        let global = [GLOBAL_REGION.to_string()];

        if filters.accepts_kind(Kind::IamUser) {
            collection.extend(collect_regions(self.name(), &global, cancel, |_| self.list_users()).await?);
        }
        if filters.accepts_kind(Kind::IamRole) {
            collection.extend(collect_regions(self.name(), &global, cancel, |_| self.list_roles()).await?);
        }
        if filters.accepts_kind(Kind::IamPolicy) {
            collection
                .extend(collect_regions(self.name(), &global, cancel, |_| self.list_policies()).await?);
        }

        collection.resources.retain(|r| filters.matches(r));
        Ok(collection)
    }

    async fn status(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceStatus>, InventoryError> {
        Ok(cancellable(cancel, self.probe(id)).await??)
    }
}
