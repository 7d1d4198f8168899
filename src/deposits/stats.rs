//! Per-region aggregate counts shipped alongside the deposit dataset.

use super::dataset::DatasetError;
use crate::similarity::{self, REGION_NAME_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStats {
    pub region: String,
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub contracts: u64,
    #[serde(default)]
    pub licenses: u64,
    #[serde(default)]
    pub reconnaissance: u64,
    #[serde(default)]
    pub mining: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RegionStatsTable {
    rows: Vec<RegionStats>,
}

impl RegionStatsTable {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let data = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, DatasetError> {
        let rows: Vec<RegionStats> = serde_json::from_str(data)?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[RegionStats] {
        &self.rows
    }

    /// Exact region name, else the closest strict match above threshold.
    pub fn lookup(&self, name: &str) -> Option<&RegionStats> {
        if let Some(row) = self.rows.iter().find(|r| r.region == name) {
            return Some(row);
        }
        similarity::best_match(
            name,
            self.rows.as_slice(),
            |r| r.region.as_str(),
            similarity::strict_similarity,
            REGION_NAME_THRESHOLD,
        )
        .map(|(row, _)| row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        {"region": "Алтайский район", "users": 12, "contracts": 30, "licenses": 25, "reconnaissance": 8, "mining": 17},
        {"region": "Курчумский район", "users": 3, "contracts": 4, "licenses": 4, "reconnaissance": 1, "mining": 3},
        {"region": "Уланский район"}
    ]"#;

    #[test]
    fn test_lookup_exact_and_fuzzy() {
        let table = RegionStatsTable::from_json_str(TABLE).unwrap();
        assert_eq!(table.lookup("Алтайский район").unwrap().mining, 17);
        assert_eq!(table.lookup("Курчумский").unwrap().users, 3);
        assert_eq!(table.lookup("уланский р-н").unwrap().licenses, 0);
        assert!(table.lookup("Жарма").is_none());
    }

    #[test]
    fn test_invalid_table() {
        assert!(RegionStatsTable::from_json_str(r#"{"region": "x"}"#).is_err());
    }
}
