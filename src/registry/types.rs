//! Core types for regions, license holders and license details.

use crate::geometry::{self, Ring};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of work a license covers. Wire values are the Russian labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    #[serde(rename = "разведка")]
    Exploration,
    #[serde(rename = "добыча")]
    Extraction,
}

impl Activity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exploration => "разведка",
            Self::Extraction => "добыча",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Activity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "разведка" | "razvedka" | "exploration" => Ok(Self::Exploration),
            "добыча" | "dobycha" | "extraction" | "mining" => Ok(Self::Extraction),
            _ => Err(format!("Unknown activity '{}'. Use 'razvedka' or 'dobycha'.", s)),
        }
    }
}

/// Mineral category: ОПИ (common minerals) or ТПИ (solid minerals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "ОПИ")]
    Opi,
    #[serde(rename = "ТПИ")]
    Tpi,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Opi => "ОПИ",
            Self::Tpi => "ТПИ",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ОПИ" | "OPI" => Ok(Self::Opi),
            "ТПИ" | "TPI" => Ok(Self::Tpi),
            _ => Err(format!("Unknown category '{}'. Use 'opi' or 'tpi'.", s)),
        }
    }
}

/// A license holder as listed under a region by the remote API.
///
/// Fields stay raw strings: the API is not owned here and its values are
/// only loosely enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Company {
    #[serde(default, deserialize_with = "lenient_text")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub company_title: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: String,
}

impl Company {
    /// Exact-label activity, `None` for anything else.
    pub fn activity(&self) -> Option<Activity> {
        match self.kind.as_str() {
            "разведка" => Some(Activity::Exploration),
            "добыча" => Some(Activity::Extraction),
            _ => None,
        }
    }
}

/// An administrative region with its boundary and license holders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "company")]
    pub companies: Vec<Company>,
    /// Boundary in `[lat, lon]` order.
    #[serde(default)]
    pub coordinates: Ring,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Contract and parcel details for one license location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Parcel type, e.g. "горный".
    #[serde(default, deserialize_with = "lenient_string")]
    pub tparcel: Option<String>,
    /// Parcel area in km².
    #[serde(default, deserialize_with = "lenient_string")]
    pub parcelarea: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nlicense: Option<String>,
    #[serde(default, rename = "admterr_id/oblast_admterr_id/name", deserialize_with = "lenient_string")]
    pub oblast_name: Option<String>,
    #[serde(default, rename = "admterr_id/oblast_admterr_id/name_kk", deserialize_with = "lenient_string")]
    pub oblast_name_kk: Option<String>,
    #[serde(default, rename = "admterr_id/oblast_admterr_id", deserialize_with = "lenient_string")]
    pub oblast_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mineraldeveloper: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contractbegin_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub contractend_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tminerals: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub deposit: Option<String>,
    /// Parcel depth in metres.
    #[serde(default, deserialize_with = "lenient_string")]
    pub parceldepth: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ncontract: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub parcel_date: Option<String>,
    /// Raw `[[[ [lon, lat], ... ]]]` polygon as the API sends it.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub coordinates: Value,
}

impl LicenseInfo {
    /// The parcel outline (`coordinates[0][0]`) in `[lat, lon]` order.
    pub fn polygon(&self) -> Option<Ring> {
        let raw = self.coordinates.get(0)?.get(0)?;
        let ring = geometry::flip_ring(raw);
        (!ring.is_empty()).then_some(ring)
    }
}

/// Accept strings, numbers and booleans where the API is inconsistent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Like [`lenient_string`], with null read as empty text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// A license parcel fetched for a company, keyed for merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedPolygon {
    pub id: String,
    pub coordinates: Ring,
    pub company: Company,
    pub data: LicenseInfo,
}

impl FetchedPolygon {
    pub fn id_for(company: &Company) -> String {
        format!("{}-{}", company.company_title, company.location)
    }

    /// Build from an info response; `None` if the response carries no outline.
    pub fn from_info(company: &Company, info: LicenseInfo) -> Option<Self> {
        let coordinates = info.polygon()?;
        Some(Self {
            id: Self::id_for(company),
            coordinates,
            company: company.clone(),
            data: info,
        })
    }
}
