//! Tag and timestamp conversion shared by the AWS collectors

use crate::resource::to_utc;
use aws_sdk_ec2::primitives::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tag key AWS consoles use for display names
pub const NAME_TAG: &str = "Name";

/// Extract tags from any AWS tag type.
///
/// EC2 and RDS tags have optional keys and values; S3 and IAM tags do not.
/// The closures paper over the difference.
fn extract_tags<T>(
    tags: &[T],
    key: impl Fn(&T) -> Option<&str>,
    value: impl Fn(&T) -> Option<&str>,
) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| match (key(t), value(t)) {
            (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
            _ => None,
        })
        .collect()
}

pub fn ec2_tags(tags: &[aws_sdk_ec2::types::Tag]) -> BTreeMap<String, String> {
    extract_tags(tags, |t| t.key(), |t| t.value())
}

pub fn rds_tags(tags: &[aws_sdk_rds::types::Tag]) -> BTreeMap<String, String> {
    extract_tags(tags, |t| t.key(), |t| t.value())
}

pub fn s3_tags(tags: &[aws_sdk_s3::types::Tag]) -> BTreeMap<String, String> {
    extract_tags(tags, |t| Some(t.key()), |t| Some(t.value()))
}

pub fn iam_tags(tags: &[aws_sdk_iam::types::Tag]) -> BTreeMap<String, String> {
    extract_tags(tags, |t| Some(t.key()), |t| Some(t.value()))
}

/// Display name: the `Name` tag when present and non-empty, else `fallback`
pub fn display_name<'a>(tags: &'a BTreeMap<String, String>, fallback: &'a str) -> &'a str {
    tags.get(NAME_TAG)
        .map(String::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(fallback)
}

/// SDK timestamp -> chrono
pub fn timestamp(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    to_utc(dt.secs(), dt.subsec_nanos())
}
