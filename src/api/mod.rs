//! Remote licensing API: HTTP client, response cache and concurrent fetching.

pub mod cache;
pub mod client;
pub mod fanout;
pub mod types;

pub use cache::InfoCache;
pub use client::{info_from_response, regions_from_area, ApiClient, InfoSource, RegionSource};
pub use fanout::{load_all_coordinates, merge_polygons, DEFAULT_FETCH_CONCURRENCY};
pub use types::{ApiError, INFO_NOT_FOUND};
