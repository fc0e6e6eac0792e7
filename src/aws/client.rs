//! AWS client context
//!
//! Holds the authenticated SDK configuration and hands out region-scoped
//! service clients. Every collector call builds its own clients, so nothing
//! mutable is shared between calls.

use crate::resource::{primary_region, RegionSettings};
use aws_config::{Region, SdkConfig};
use std::sync::Arc;

/// Regions listed by `regions` and used for validation hints
pub const SUPPORTED_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-north-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-south-1",
    "ca-central-1",
    "sa-east-1",
    "af-south-1",
    "me-south-1",
];

/// Authenticated, read-only AWS context shared by all collectors
#[derive(Clone, Debug)]
pub struct AwsClient {
    config: Arc<SdkConfig>,
    settings: RegionSettings,
}

impl AwsClient {
    pub fn new(config: SdkConfig, settings: RegionSettings) -> Self {
        Self {
            config: Arc::new(config),
            settings,
        }
    }

    pub fn settings(&self) -> &RegionSettings {
        &self.settings
    }

    /// Region for global services and single lookups
    pub fn home_region(&self) -> String {
        primary_region(&self.settings)
    }

    pub fn ec2(&self, region: &str) -> aws_sdk_ec2::Client {
        let conf = aws_sdk_ec2::config::Builder::from(self.config.as_ref())
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_ec2::Client::from_conf(conf)
    }

    pub fn rds(&self, region: &str) -> aws_sdk_rds::Client {
        let conf = aws_sdk_rds::config::Builder::from(self.config.as_ref())
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_rds::Client::from_conf(conf)
    }

    /// S3 client; path-style addressing when the endpoint is overridden
    pub fn s3(&self, region: &str) -> aws_sdk_s3::Client {
        let conf = aws_sdk_s3::config::Builder::from(self.config.as_ref())
            .region(Region::new(region.to_string()))
            .force_path_style(self.config.endpoint_url().is_some())
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }

    /// IAM is global; the client is pinned to the home region for signing
    pub fn iam(&self) -> aws_sdk_iam::Client {
        let conf = aws_sdk_iam::config::Builder::from(self.config.as_ref())
            .region(Region::new(self.home_region()))
            .build();
        aws_sdk_iam::Client::from_conf(conf)
    }
}
