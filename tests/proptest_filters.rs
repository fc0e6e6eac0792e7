//! Property-based tests using proptest
//!
//! These tests verify the filter predicate, kind normalization and filter
//! input parsing using randomized resources and filters.

use chrono::{DateTime, Duration, TimeZone, Utc};
use cloudview::resource::{
    matches, normalize_kind, parse_tag, FilterInput, Kind, Resource, ResourceFilters,
};
use proptest::prelude::*;

const REGIONS: [&str; 4] = ["us-east-1", "us-west-2", "eu-west-1", "global"];
const STATES: [&str; 5] = ["running", "stopped", "pending", "available", "active"];
const KINDS: [Kind; 5] = [
    Kind::VirtualMachine,
    Kind::ObjectStorage,
    Kind::Database,
    Kind::Vpc,
    Kind::IamUser,
];

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Generate an arbitrary normalized resource
fn arb_resource() -> impl Strategy<Value = Resource> {
    (
        "[a-z][a-z0-9-]{0,20}", // id
        0..KINDS.len(),
        0..REGIONS.len(),
        0..STATES.len(),
        prop::collection::btree_map("[a-c]", "[x-z]", 0..3),
        0i64..365, // days after base_time
    )
        .prop_map(|(id, kind, region, state, tags, days)| {
            let mut r = Resource::new(id, "", KINDS[kind], "aws", REGIONS[region])
                .with_state(STATES[state])
                .with_tags(tags);
            r.created_at = base_time() + Duration::days(days);
            r
        })
}

/// Generate a list of resources
fn arb_resource_list() -> impl Strategy<Value = Vec<Resource>> {
    prop::collection::vec(arb_resource(), 0..60)
}

/// Generate an arbitrary filter set drawn from the same vocabulary
fn arb_filters() -> impl Strategy<Value = ResourceFilters> {
    (
        prop::collection::vec(prop::sample::select(REGIONS.to_vec()), 0..3),
        prop::collection::vec(prop::sample::select(vec!["vm", "s3", "RDS", "vpc", "iam"]), 0..3),
        prop::collection::btree_map("[a-c]", "[x-z]", 0..2),
        prop::collection::vec(prop::sample::select(STATES.to_vec()), 0..3),
        prop::option::of(0i64..365),
        prop::option::of(0i64..365),
    )
        .prop_map(|(regions, kinds, tags, statuses, after, before)| ResourceFilters {
            regions: regions.into_iter().map(String::from).collect(),
            kinds: kinds.into_iter().map(String::from).collect(),
            tags,
            statuses: statuses.into_iter().map(String::from).collect(),
            created_after: after.map(|d| base_time() + Duration::days(d)),
            created_before: before.map(|d| base_time() + Duration::days(d)),
        })
}

fn apply(resources: &[Resource], filters: &ResourceFilters) -> Vec<Resource> {
    resources
        .iter()
        .filter(|r| matches(r, filters))
        .cloned()
        .collect()
}

proptest! {
    /// Empty filter returns all resources
    #[test]
    fn empty_filter_returns_all(resources in arb_resource_list()) {
        let filtered = apply(&resources, &ResourceFilters::default());
        prop_assert_eq!(filtered.len(), resources.len());
    }

    /// Filtering twice with the same filter gives the same result
    #[test]
    fn filter_is_idempotent(resources in arb_resource_list(), filters in arb_filters()) {
        let once = apply(&resources, &filters);
        let twice = apply(&once, &filters);
        prop_assert_eq!(once, twice);
    }

    /// Filtering never increases the number of resources
    #[test]
    fn filter_never_increases_count(resources in arb_resource_list(), filters in arb_filters()) {
        prop_assert!(apply(&resources, &filters).len() <= resources.len());
    }

    /// Adding a tag clause can only narrow the result
    #[test]
    fn extra_tag_clause_narrows(
        resources in arb_resource_list(),
        filters in arb_filters(),
        key in "[a-c]",
        value in "[x-z]"
    ) {
        let mut narrowed = filters.clone();
        narrowed.tags.insert(key, value);
        prop_assert!(apply(&resources, &narrowed).len() <= apply(&resources, &filters).len());
    }

    /// Kind terms are case-insensitive
    #[test]
    fn kind_clause_is_case_insensitive(resources in arb_resource_list(), term in "(vm|s3|rds|vpc|iam)") {
        let lower = ResourceFilters { kinds: vec![term.to_lowercase()], ..Default::default() };
        let upper = ResourceFilters { kinds: vec![term.to_uppercase()], ..Default::default() };
        prop_assert_eq!(apply(&resources, &lower), apply(&resources, &upper));
    }

    /// Every survivor satisfies each clause individually
    #[test]
    fn survivors_satisfy_every_clause(resources in arb_resource_list(), filters in arb_filters()) {
        for r in apply(&resources, &filters) {
            prop_assert!(filters.regions.is_empty() || filters.regions.contains(&r.region));
            prop_assert!(filters.statuses.is_empty() || filters.statuses.contains(&r.status.state));
            for (k, v) in &filters.tags {
                prop_assert_eq!(r.tag(k), Some(v.as_str()));
            }
            if let Some(after) = filters.created_after {
                prop_assert!(r.created_at > after);
            }
            if let Some(before) = filters.created_before {
                prop_assert!(r.created_at < before);
            }
        }
    }
}

/// Tests for the creation-time window bounds
mod window_tests {
    use super::*;

    proptest! {
        /// Both bounds are exclusive
        #[test]
        fn bounds_are_exclusive(days in 0i64..365) {
            let at = base_time() + Duration::days(days);
            let mut r = Resource::new("i-1", "", Kind::VirtualMachine, "aws", "us-east-1");
            r.created_at = at;

            let after = ResourceFilters { created_after: Some(at), ..Default::default() };
            let before = ResourceFilters { created_before: Some(at), ..Default::default() };
            prop_assert!(!matches(&r, &after));
            prop_assert!(!matches(&r, &before));
        }
    }
}

/// Tests for kind normalization
mod kind_tests {
    use super::*;

    proptest! {
        /// Every alias normalizes to its kind regardless of case
        #[test]
        fn aliases_normalize_to_their_kind(index in 0..Kind::ALL.len(), upper in any::<bool>()) {
            let kind = Kind::ALL[index];
            for alias in kind.aliases() {
                let term = if upper { alias.to_uppercase() } else { alias.clone() };
                prop_assert_eq!(normalize_kind(&term), kind);
            }
            prop_assert_eq!(normalize_kind(kind.as_str()), kind);
        }

        /// Digit-only strings are never a kind
        #[test]
        fn garbage_is_unknown(raw in "[0-9]{1,12}") {
            prop_assert_eq!(normalize_kind(&raw), Kind::Unknown);
        }
    }
}

/// Tests for raw filter input validation
mod input_validation_tests {
    use super::*;

    proptest! {
        /// Well-formed tags parse back to their parts
        #[test]
        fn valid_tags_accepted(key in "[A-Za-z][A-Za-z0-9_]{0,15}", value in "[A-Za-z0-9=]{0,15}") {
            let (k, v) = parse_tag(&format!("{}={}", key, value)).unwrap();
            prop_assert_eq!(k, key);
            prop_assert_eq!(v, value);
        }

        /// Tags without a separator are rejected
        #[test]
        fn tag_without_separator_rejected(raw in "[A-Za-z0-9]{1,20}") {
            let err = parse_tag(&raw).unwrap_err();
            prop_assert!(err.is_validation());
        }

        /// A window whose start is not before its end is rejected
        #[test]
        fn inverted_window_rejected(start in 0i64..100, gap in 0i64..100) {
            let after = base_time() + Duration::days(start + gap);
            let before = base_time() + Duration::days(start);
            let input = FilterInput {
                created_after: Some(after.to_rfc3339()),
                created_before: Some(before.to_rfc3339()),
                ..Default::default()
            };
            prop_assert!(input.parse().is_err());
        }

        /// Duplicate values collapse
        #[test]
        fn duplicate_regions_collapse(region in prop::sample::select(REGIONS.to_vec()), n in 1usize..5) {
            let input = FilterInput {
                regions: vec![region.to_string(); n],
                ..Default::default()
            };
            let filters = input.parse().unwrap();
            prop_assert_eq!(filters.regions, vec![region.to_string()]);
        }
    }
}
