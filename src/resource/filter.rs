//! Resource filters and the shared match predicate
//!
//! Every collector applies [`ResourceFilters::matches`] after a resource is
//! fully built. Clauses are AND'd; an empty clause accepts everything.

use super::model::Resource;
use super::registry::{is_known_kind, normalize_kind, term_selects, term_subtype, Kind};
use crate::error::InventoryError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter set applied to normalized resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilters {
    /// Exact region names
    #[serde(default)]
    pub regions: Vec<String>,
    /// Kind names or aliases, case-insensitive
    #[serde(default)]
    pub kinds: Vec<String>,
    /// Every pair must be present with an equal value
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Exact provider state strings
    #[serde(default)]
    pub statuses: Vec<String>,
    /// Exclusive lower bound on `created_at`
    #[serde(default)]
    pub created_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    #[serde(default)]
    pub created_before: Option<DateTime<Utc>>,
}

impl ResourceFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no clause constrains anything
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
            && self.kinds.is_empty()
            && self.tags.is_empty()
            && self.statuses.is_empty()
            && self.created_after.is_none()
            && self.created_before.is_none()
    }

    /// Evaluate every clause against `resource`
    pub fn matches(&self, resource: &Resource) -> bool {
        self.accepts_resource_kind(resource)
            && self.accepts_region(&resource.region)
            && self.accepts_tags(resource)
            && self.accepts_state(&resource.status.state)
            && self.accepts_created(resource.created_at)
    }

    /// Whether some resource of `kind` could pass the kind clause.
    /// Subtype terms are not resolved here; collectors use this to skip work.
    pub fn accepts_kind(&self, kind: Kind) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|term| term_selects(term, kind))
    }

    /// Kind clause: some term selects the resource's kind and, for subtype
    /// terms, its `resource_subtype`
    fn accepts_resource_kind(&self, resource: &Resource) -> bool {
        self.kinds.is_empty()
            || self.kinds.iter().any(|term| {
                term_selects(term, resource.kind)
                    && term_subtype(term).map_or(true, |subtype| {
                        resource.metadata("resource_subtype").and_then(|v| v.as_str())
                            == Some(subtype)
                    })
            })
    }

    /// True when at least one of `kinds` could pass the kind clause
    pub fn accepts_any_kind(&self, kinds: &[Kind]) -> bool {
        kinds.iter().any(|k| self.accepts_kind(*k))
    }

    pub fn accepts_region(&self, region: &str) -> bool {
        self.regions.is_empty() || self.regions.iter().any(|r| r == region)
    }

    fn accepts_tags(&self, resource: &Resource) -> bool {
        self.tags
            .iter()
            .all(|(key, value)| resource.tag(key) == Some(value.as_str()))
    }

    fn accepts_state(&self, state: &str) -> bool {
        self.statuses.is_empty() || self.statuses.iter().any(|s| s == state)
    }

    fn accepts_created(&self, created_at: DateTime<Utc>) -> bool {
        if let Some(after) = self.created_after {
            if created_at <= after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if created_at >= before {
                return false;
            }
        }
        true
    }

    /// Copy of these filters narrowed to what `term` dispatches to: its
    /// kind, or its subtype when the term names one. Group terms collapse to
    /// the kind they normalize to.
    pub fn for_term(&self, term: &str) -> Self {
        let kept = match term_subtype(term) {
            Some(_) => term.trim().to_lowercase(),
            None => normalize_kind(term).as_str().to_string(),
        };
        Self {
            kinds: vec![kept],
            ..self.clone()
        }
    }
}

/// Free-function form of [`ResourceFilters::matches`]
pub fn matches(resource: &Resource, filters: &ResourceFilters) -> bool {
    filters.matches(resource)
}

// ============================================================================
// Parsing of raw (CLI / config) filter input
// ============================================================================

/// Unvalidated filter input as typed by a user
#[derive(Debug, Clone, Default)]
pub struct FilterInput {
    pub regions: Vec<String>,
    pub kinds: Vec<String>,
    /// `key=value` strings
    pub tags: Vec<String>,
    pub statuses: Vec<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
}

impl FilterInput {
    /// Validate and convert into [`ResourceFilters`].
    ///
    /// Fails on malformed tags, unparseable dates, unknown kinds or an empty
    /// creation window.
    pub fn parse(self) -> Result<ResourceFilters, InventoryError> {
        let mut tags = BTreeMap::new();
        for raw in &self.tags {
            let (key, value) = parse_tag(raw)?;
            tags.insert(key, value);
        }

        for kind in &self.kinds {
            if !is_known_kind(kind) {
                return Err(InventoryError::validation(
                    "type",
                    format!("unknown resource type: {}", kind),
                ));
            }
        }

        let created_after = self
            .created_after
            .as_deref()
            .map(|s| parse_date("created-after", s))
            .transpose()?;
        let created_before = self
            .created_before
            .as_deref()
            .map(|s| parse_date("created-before", s))
            .transpose()?;

        if let (Some(after), Some(before)) = (created_after, created_before) {
            if after >= before {
                return Err(InventoryError::validation(
                    "created-after",
                    format!("{} is not earlier than created-before {}", after, before),
                ));
            }
        }

        Ok(ResourceFilters {
            regions: dedup(self.regions),
            kinds: dedup(self.kinds),
            tags,
            statuses: dedup(self.statuses),
            created_after,
            created_before,
        })
    }
}

/// Parse a `key=value` tag. The value may itself contain `=`.
pub fn parse_tag(raw: &str) -> Result<(String, String), InventoryError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(InventoryError::validation(
            "tag",
            format!("invalid tag format: {} (expected key=value)", raw),
        )),
    }
}

/// Parse `YYYY-MM-DD` (UTC midnight) or a full RFC 3339 timestamp
pub fn parse_date(field: &'static str, raw: &str) -> Result<DateTime<Utc>, InventoryError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            InventoryError::validation(
                field,
                format!("invalid date format: {} (expected YYYY-MM-DD)", raw),
            )
        })
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
