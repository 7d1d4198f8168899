//! The spreadsheet-derived deposit dataset.
//!
//! Rows are keyed by the sheet's Cyrillic column headers, some of which carry
//! embedded newlines. The file is either a bare array of rows or an object
//! with a `features` array.

use crate::geometry::{self, Bounds, Ring};
use crate::similarity::{self, REGION_NAME_THRESHOLD};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Query value selecting every region at once.
pub const ALL_REGIONS: &str = "__all__";

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
struct SheetRow {
    #[serde(rename = "Группа ПИ", default, deserialize_with = "cell")]
    mineral_group: Option<String>,
    #[serde(rename = "№\nп.п.", default, deserialize_with = "cell")]
    number: Option<String>,
    #[serde(rename = "\nНаименование месторождения, место расположения\n", default, deserialize_with = "cell")]
    deposit_name: Option<String>,
    #[serde(rename = "БИН", default, deserialize_with = "cell")]
    bin: Option<String>,
    #[serde(rename = "Полезные ископаемые (запасы, годовой объем добычи)", default, deserialize_with = "cell")]
    minerals: Option<String>,
    #[serde(rename = "Вид проводимых работ", default, deserialize_with = "cell")]
    work_type: Option<String>,
    #[serde(rename = "Информация по недропользователю (наименование, место регестрации)", default, deserialize_with = "cell")]
    company: Option<String>,
    #[serde(rename = "Информация по контракту/лицензии (номер, дата и срок действия)", default, deserialize_with = "cell")]
    contract_info: Option<String>,
    #[serde(rename = "Координаты", default)]
    coordinates: Value,
    #[serde(rename = "Район", default, deserialize_with = "cell")]
    district: Option<String>,
}

/// Spreadsheet cells arrive as strings or numbers; both become trimmed text.
fn cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    })
}

/// One deposit row, parsed and immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositRecord {
    pub id: String,
    pub deposit_name: String,
    pub bin: String,
    pub minerals: String,
    pub work_type: String,
    pub company: String,
    pub contract_info: String,
    pub mineral_group: String,
    /// Outlines in `[lat, lon]` order; empty when the cell was unusable.
    pub rings: Vec<Ring>,
    /// District label from the `Район` column.
    pub region: String,
}

impl DepositRecord {
    fn from_row(row: SheetRow, index: usize) -> Self {
        let number = row.number.filter(|n| !n.is_empty()).unwrap_or_else(|| (index + 1).to_string());
        Self {
            id: format!("excel-{}", number),
            deposit_name: row.deposit_name.unwrap_or_default(),
            bin: row.bin.unwrap_or_default(),
            minerals: row.minerals.unwrap_or_default(),
            work_type: row.work_type.unwrap_or_default(),
            company: row.company.unwrap_or_default(),
            contract_info: row.contract_info.unwrap_or_default(),
            mineral_group: row.mineral_group.unwrap_or_default(),
            rings: geometry::parse_geometry_value(&row.coordinates),
            region: row.district.unwrap_or_default(),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_rings(self.rings.iter().map(|r| r.as_slice()))
    }
}

/// Which deposit rows the panel shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum DepositFilter {
    #[default]
    Hidden,
    All,
    Region(String),
}

impl DepositFilter {
    /// `None`/empty → nothing, `__all__` → everything, else one region label.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            None | Some("") => Self::Hidden,
            Some(ALL_REGIONS) => Self::All,
            Some(label) => Self::Region(label.to_string()),
        }
    }
}

/// The loaded deposit dataset.
#[derive(Debug, Clone, Default)]
pub struct DepositDataset {
    records: Vec<DepositRecord>,
}

impl DepositDataset {
    /// Load from a JSON file on disk.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let data = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let dataset = Self::from_json_str(&data)?;
        debug!(path = %path.display(), records = dataset.len(), "loaded deposit dataset");
        Ok(dataset)
    }

    pub fn from_json_str(data: &str) -> Result<Self, DatasetError> {
        let value: Value = serde_json::from_str(data)?;
        Ok(Self::from_value(&value))
    }

    /// Build from a decoded document. Shapes other than an array of rows or
    /// an object with a `features` array give an empty dataset.
    pub fn from_value(value: &Value) -> Self {
        let rows: &[Value] = match value {
            Value::Array(rows) => rows.as_slice(),
            Value::Object(obj) => match obj.get("features") {
                Some(Value::Array(rows)) => rows.as_slice(),
                _ => &[],
            },
            _ => &[],
        };

        let records = rows
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let raw = raw.get("properties").filter(|p| p.is_object()).unwrap_or(raw);
                match SheetRow::deserialize(raw) {
                    Ok(row) => Some(DepositRecord::from_row(row, index)),
                    Err(e) => {
                        warn!(row = index, error = %e, "skipping unreadable deposit row");
                        None
                    }
                }
            })
            .collect();

        Self { records }
    }

    pub fn records(&self) -> &[DepositRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DepositRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Sorted, de-duplicated, non-empty district labels.
    pub fn region_labels(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.region.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter(&self, filter: &DepositFilter) -> Vec<&DepositRecord> {
        match filter {
            DepositFilter::Hidden => Vec::new(),
            DepositFilter::All => self.records.iter().collect(),
            DepositFilter::Region(label) => self.records.iter().filter(|r| &r.region == label).collect(),
        }
    }

    /// Resolve a region name from another source to this dataset's label.
    ///
    /// Exact label first, then the best strict similarity at or above
    /// [`REGION_NAME_THRESHOLD`].
    pub fn match_region(&self, name: &str) -> Option<String> {
        let labels = self.region_labels();
        if labels.iter().any(|l| l == name) {
            return Some(name.to_string());
        }
        similarity::best_match(name, labels.as_slice(), |l| l.as_str(), similarity::strict_similarity, REGION_NAME_THRESHOLD)
            .map(|(label, score)| {
                debug!(query = name, label = %label, score, "reconciled region label");
                label.clone()
            })
    }

    /// Records for a region named by another source, with the matched label.
    pub fn for_region(&self, name: &str) -> (Option<String>, Vec<&DepositRecord>) {
        match self.match_region(name) {
            Some(label) => {
                let records = self.filter(&DepositFilter::Region(label.clone()));
                (Some(label), records)
            }
            None => (None, Vec::new()),
        }
    }

    /// Bounds of every outline in a set of records.
    pub fn bounds_of(records: &[&DepositRecord]) -> Option<Bounds> {
        Bounds::of_rings(records.iter().flat_map(|r| r.rings.iter().map(|ring| ring.as_slice())))
    }
}
