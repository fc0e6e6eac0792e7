//! Canonical resource model
//!
//! Every collector normalizes its provider-specific API payloads into
//! [`Resource`]. The filter predicate, the output layer and the CLI only
//! ever see this shape.

use super::registry::{health_for, Kind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Health bucket derived from a provider state string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Unhealthy,
    Warning,
    #[default]
    Unknown,
}

impl Health {
    pub fn as_str(self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Unhealthy => "unhealthy",
            Health::Warning => "warning",
            Health::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed state of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Provider state string, verbatim ("running", "available", ...)
    pub state: String,
    pub health: Health,
    pub last_checked: DateTime<Utc>,
}

impl ResourceStatus {
    /// Build a status for `kind`, deriving health from the kind's state table
    pub fn observed(kind: Kind, state: impl Into<String>) -> Self {
        let state = state.into();
        Self {
            health: health_for(kind, &state),
            state,
            last_checked: Utc::now(),
        }
    }

    /// Placeholder status before anything has been observed
    pub fn unknown() -> Self {
        Self {
            state: "unknown".to_string(),
            health: Health::Unknown,
            last_checked: Utc::now(),
        }
    }
}

/// Cost estimate (not populated by any collector yet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub daily: f64,
    pub monthly: f64,
    pub currency: String,
}

/// Canonical cross-provider resource record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub kind: Kind,
    pub provider: String,
    pub region: String,
    pub status: ResourceStatus,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<ResourceCost>,
}

impl Resource {
    /// Create a resource with empty tags/metadata and an unknown status.
    ///
    /// `id` must be non-empty; collectors skip raw items without one.
    /// An empty `name` falls back to `id`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: Kind,
        provider: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let id = id.into();
        debug_assert!(!id.is_empty(), "resource id must not be empty");
        let name = name.into();
        let now = Utc::now();

        Self {
            name: if name.is_empty() { id.clone() } else { name },
            id,
            kind,
            provider: provider.into(),
            region: region.into(),
            status: ResourceStatus::unknown(),
            tags: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            metadata: BTreeMap::new(),
            cost: None,
        }
    }

    /// Set the creation time, ignoring missing values
    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        if let Some(ts) = created_at {
            self.created_at = ts;
        }
        self
    }

    /// Set the observed state, deriving health from the kind's table
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.status = ResourceStatus::observed(self.kind, state);
        self
    }

    /// Replace all tags
    pub fn with_tags<I, K, V>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Insert a metadata value; `None` leaves the key absent
    pub fn set_metadata(&mut self, key: &str, value: impl Into<Option<Value>>) {
        if let Some(value) = value.into() {
            self.metadata.insert(key.to_string(), value);
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Record a newly observed state.
    ///
    /// `last_checked` never moves backwards; `updated_at` advances only when
    /// the state actually changes.
    pub fn update_status(&mut self, state: impl Into<String>) {
        let state = state.into();
        let now = Utc::now().max(self.status.last_checked);

        if state != self.status.state {
            self.status.health = health_for(self.kind, &state);
            self.status.state = state;
            self.updated_at = now.max(self.updated_at);
        }
        self.status.last_checked = now;
    }
}

/// Convert an SDK timestamp into chrono
pub fn to_utc(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vm(id: &str) -> Resource {
        Resource::new(id, "", Kind::VirtualMachine, "aws", "us-east-1")
    }

    #[test]
    fn test_new_resource_defaults() {
        let r = vm("i-123");
        assert_eq!(r.name, "i-123", "Empty name should fall back to id");
        assert!(r.tags.is_empty());
        assert!(r.metadata.is_empty());
        assert_eq!(r.status.state, "unknown");
        assert_eq!(r.status.health, Health::Unknown);
        assert!(r.cost.is_none());
    }

    #[test]
    fn test_tags_and_metadata() {
        let mut r = vm("i-1");
        r.set_tag("Env", "prod");
        r.set_metadata("instance_type", json!("t3.micro"));
        r.set_metadata("public_ip", None::<Value>);

        assert_eq!(r.tag("Env"), Some("prod"));
        assert_eq!(r.tag("Missing"), None);
        assert_eq!(r.metadata("instance_type"), Some(&json!("t3.micro")));
        assert!(r.metadata("public_ip").is_none(), "None should not insert");
    }

    #[test]
    fn test_update_status_derives_health() {
        let mut r = vm("i-1");
        let before = r.updated_at;
        r.update_status("running");

        assert_eq!(r.status.state, "running");
        assert_eq!(r.status.health, Health::Healthy);
        assert!(r.updated_at >= before);

        r.update_status("stopped");
        assert_eq!(r.status.health, Health::Unhealthy);
    }

    #[test]
    fn test_last_checked_is_monotonic() {
        let mut r = vm("i-1");
        let future = Utc::now() + chrono::Duration::hours(1);
        r.status.last_checked = future;

        r.update_status("running");
        assert!(
            r.status.last_checked >= future,
            "last_checked must never move backwards"
        );
    }

    #[test]
    fn test_unchanged_state_keeps_updated_at() {
        let mut r = vm("i-1");
        r.update_status("running");
        let updated = r.updated_at;

        r.update_status("running");
        assert_eq!(r.updated_at, updated);
    }

    #[test]
    fn test_serializes_kind_and_empty_maps() {
        let r = vm("i-1");
        let value = serde_json::to_value(&r).unwrap();

        assert_eq!(value["kind"], "virtual_machine");
        assert_eq!(value["status"]["health"], "unknown");
        assert_eq!(value["tags"], json!({}));
        assert_eq!(value["metadata"], json!({}));
        assert!(value.get("cost").is_none());
    }
}
