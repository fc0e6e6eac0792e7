//! AWS provider
//!
//! # Architecture
//!
//! - [`auth`] - credential resolution, role assumption and [`AwsConnector`]
//! - [`client`] - authenticated SDK config and region-scoped clients
//! - [`error`] - SDK error classification
//! - [`tags`] - tag and timestamp conversion
//! - [`compute`], [`storage`], [`database`], [`identity`], [`network`] -
//!   one collector per service family
//!
//! Collectors are probed for status in the order they are listed by
//! [`AwsConnector`]: EC2, S3, RDS, IAM, VPC.

pub mod auth;
pub mod client;
pub mod compute;
pub mod database;
pub mod error;
pub mod identity;
pub mod network;
pub mod storage;
pub mod tags;

pub use auth::AwsConnector;
pub use client::{AwsClient, SUPPORTED_REGIONS};
pub use compute::ComputeCollector;
pub use database::DatabaseCollector;
pub use error::AwsError;
pub use identity::IdentityCollector;
pub use network::NetworkCollector;
pub use storage::StorageCollector;
