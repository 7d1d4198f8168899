use crate::api::{ApiError, RegionSource};
use crate::deposits::{DepositDataset, RegionStatsTable};
use crate::registry::Region;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct AppState {
    pub source: Arc<dyn RegionSource>,
    pub dataset: DepositDataset,
    pub stats: RegionStatsTable,
    pub fetch_concurrency: usize,
    regions: Mutex<Option<Vec<Region>>>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn RegionSource>,
        dataset: DepositDataset,
        stats: RegionStatsTable,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            source,
            dataset,
            stats,
            fetch_concurrency: fetch_concurrency.max(1),
            regions: Mutex::new(None),
        }
    }

    /// Region list, fetched once and kept for the life of the server.
    pub async fn regions(&self) -> Result<Vec<Region>, ApiError> {
        if let Ok(cached) = self.regions.lock() {
            if let Some(regions) = cached.as_ref() {
                return Ok(regions.clone());
            }
        }

        let source = Arc::clone(&self.source);
        let regions = tokio::task::spawn_blocking(move || source.fetch_regions())
            .await
            .map_err(|e| ApiError::Network(e.to_string()))??;

        if let Ok(mut cached) = self.regions.lock() {
            debug!(count = regions.len(), "caching region list");
            *cached = Some(regions.clone());
        }
        Ok(regions)
    }
}
