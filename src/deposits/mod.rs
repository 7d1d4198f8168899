//! Locally bundled deposit data: the spreadsheet export and the region
//! stats lookup table.

pub mod dataset;
pub mod stats;

pub use dataset::{DatasetError, DepositDataset, DepositFilter, DepositRecord, ALL_REGIONS};
pub use stats::{RegionStats, RegionStatsTable};
