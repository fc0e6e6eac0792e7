//! Resource Fetcher
//!
//! Region resolution and the per-region collection loop shared by every
//! regional collector.

use super::filter::ResourceFilters;
use super::model::Resource;
use crate::error::InventoryError;
use crate::provider::{Collection, Warning};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Used when neither filters nor configuration name a region
pub const FALLBACK_REGION: &str = "us-east-1";

/// Region label for provider-wide resources
pub const GLOBAL_REGION: &str = "global";

/// Region configuration a collector was built with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionSettings {
    pub regions: Vec<String>,
    pub default_region: Option<String>,
}

impl RegionSettings {
    pub fn new(regions: Vec<String>, default_region: Option<String>) -> Self {
        Self {
            regions,
            default_region,
        }
    }
}

/// Resolve the regions a regional collector should query.
///
/// Precedence: filter regions, configured regions, configured default
/// region, then [`FALLBACK_REGION`]. A filter naming only
/// [`GLOBAL_REGION`] resolves to nothing since no regional resource can match.
pub fn resolve_regions(filters: &ResourceFilters, settings: &RegionSettings) -> Vec<String> {
    if !filters.regions.is_empty() {
        return filters
            .regions
            .iter()
            .filter(|r| r.as_str() != GLOBAL_REGION)
            .cloned()
            .collect();
    }

    if !settings.regions.is_empty() {
        return settings.regions.clone();
    }

    if let Some(region) = settings.default_region.as_ref().filter(|r| !r.is_empty()) {
        return vec![region.clone()];
    }

    vec![FALLBACK_REGION.to_string()]
}

/// Region for one-shot calls (status probes, global services)
pub fn primary_region(settings: &RegionSettings) -> String {
    resolve_regions(&ResourceFilters::default(), settings)
        .into_iter()
        .next()
        .unwrap_or_else(|| FALLBACK_REGION.to_string())
}

/// Run `fetch_region` for each region in order.
///
/// A failing region is logged, recorded as a warning and skipped. Every
/// region future is raced against `cancel`; cancellation aborts the
/// in-flight call and returns [`InventoryError::Cancelled`].
pub async fn collect_regions<F, Fut>(
    source: &'static str,
    regions: &[String],
    cancel: &CancellationToken,
    mut fetch_region: F,
) -> Result<Collection, InventoryError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<Resource>>>,
{
    let mut collection = Collection::default();

    for region in regions {
        let result = cancellable(cancel, fetch_region(region.clone())).await?;

        match result {
            Ok(resources) => {
                tracing::debug!(
                    collector = source,
                    region = %region,
                    count = resources.len(),
                    "Collected region"
                );
                collection.resources.extend(resources);
            }
            Err(err) => {
                tracing::warn!(collector = source, region = %region, "Skipping region: {:#}", err);
                collection
                    .warnings
                    .push(Warning::new(source, Some(region), format!("{:#}", err)));
            }
        }
    }

    Ok(collection)
}

/// Await `fut` unless `cancel` fires first
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, InventoryError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InventoryError::Cancelled),
        out = fut => Ok(out),
    }
}
