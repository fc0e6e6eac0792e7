//! Resource abstraction layer
//!
//! The provider-agnostic half of the inventory: the canonical model, the
//! kind table, filtering and the region loop collectors share.
//!
//! # Architecture
//!
//! - [`model`] - [`Resource`] and its status/health types
//! - [`registry`] - kind aliases and state -> health tables from embedded JSON
//! - [`filter`] - [`ResourceFilters`] and the single match predicate
//! - [`fetcher`] - region resolution and per-region collection with warnings
//!
//! # Kind Definitions
//!
//! Kinds are defined in `src/resources/kinds.json`. Adding an alias or a
//! health mapping is a data change only.
//!
//! # Example
//!
//! ```ignore
//! use cloudview::resource::{normalize_kind, Kind, ResourceFilters};
//!
//! assert_eq!(normalize_kind("ec2"), Kind::VirtualMachine);
//! let filters = ResourceFilters { kinds: vec!["vm".into()], ..Default::default() };
//! ```

pub mod fetcher;
pub mod filter;
pub mod model;
pub mod registry;

pub use fetcher::{
    cancellable, collect_regions, primary_region, resolve_regions, RegionSettings,
    FALLBACK_REGION, GLOBAL_REGION,
};
pub use filter::{matches, parse_date, parse_tag, FilterInput, ResourceFilters};
pub use model::{to_utc, Health, Resource, ResourceCost, ResourceStatus};
pub use registry::{get_kind_def, health_for, is_known_kind, normalize_kind, Kind, KindDef};
