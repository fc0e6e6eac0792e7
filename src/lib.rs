//! cloudview - read-only inventory of cloud resources
//!
//! # Architecture
//!
//! - [`resource`] - canonical model, kind registry, filter predicate and
//!   region fan-out helpers
//! - [`provider`] - collector/connector traits, the per-provider aggregator,
//!   the registry and the factory
//! - [`aws`] - AWS connector and its EC2, S3, RDS, IAM and VPC collectors
//! - [`config`] - YAML configuration with environment overrides
//! - [`output`] - table, JSON and YAML rendering
//! - [`error`] - error taxonomy

pub mod aws;
pub mod config;
pub mod error;
pub mod output;
pub mod provider;
pub mod resource;

/// Version injected at compile time via CLOUDVIEW_VERSION (set by CI),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("CLOUDVIEW_VERSION") {
    Some(v) => v,
    None => "dev",
};
