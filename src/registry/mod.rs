//! Regions, license holders and the aggregates the dashboard shows for them.

pub mod aggregate;
pub mod types;

pub use aggregate::{
    count_activities, count_unique_opi_tpi, count_unique_titles, filter_by_activity,
    filter_by_category, find_region, ActivityCounts, CategoryCounts, RegionSummary,
};
pub use types::{Activity, Category, Company, FetchedPolygon, LicenseInfo, Region};
