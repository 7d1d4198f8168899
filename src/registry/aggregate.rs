//! Counting and filtering over a region's license holders.

use super::types::{Activity, Category, Company, Region};
use crate::similarity::{self, REGION_NAME_THRESHOLD};
use serde::Serialize;
use std::collections::HashSet;

/// Per-activity company counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivityCounts {
    #[serde(rename = "разведка")]
    pub exploration: usize,
    #[serde(rename = "добыча")]
    pub extraction: usize,
}

/// Distinct company titles per mineral category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    #[serde(rename = "ОПИ")]
    pub opi: usize,
    #[serde(rename = "ТПИ")]
    pub tpi: usize,
}

/// One-line overview of a region, as listed by the CLI and the server.
#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub id: String,
    pub name: String,
    pub companies: usize,
    pub unique_titles: usize,
    pub activities: ActivityCounts,
    pub categories: CategoryCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RegionSummary {
    pub fn of(region: &Region) -> Self {
        Self {
            id: region.id.clone(),
            name: region.name.clone(),
            companies: region.companies.len(),
            unique_titles: count_unique_titles(region),
            activities: count_activities(&region.companies),
            categories: count_unique_opi_tpi(region),
            url: region.url.clone(),
        }
    }
}

pub fn count_unique_titles(region: &Region) -> usize {
    region
        .companies
        .iter()
        .map(|c| c.company_title.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Companies whose type label equals the activity's label exactly.
pub fn filter_by_activity(companies: &[Company], activity: Activity) -> Vec<Company> {
    companies
        .iter()
        .filter(|c| c.kind == activity.label())
        .cloned()
        .collect()
}

/// Companies whose uppercased category contains the category label.
pub fn filter_by_category(region: &Region, category: Category) -> Vec<Company> {
    region
        .companies
        .iter()
        .filter(|c| c.category.to_uppercase().contains(category.label()))
        .cloned()
        .collect()
}

/// Raw row counts per activity. Unknown type labels are ignored.
pub fn count_activities(companies: &[Company]) -> ActivityCounts {
    let mut counts = ActivityCounts::default();
    for company in companies {
        match company.activity() {
            Some(Activity::Exploration) => counts.exploration += 1,
            Some(Activity::Extraction) => counts.extraction += 1,
            None => {}
        }
    }
    counts
}

/// Distinct titles per category. ОПИ is checked first, so a category
/// mentioning both counts toward ОПИ only.
pub fn count_unique_opi_tpi(region: &Region) -> CategoryCounts {
    let mut opi = HashSet::new();
    let mut tpi = HashSet::new();
    for company in &region.companies {
        let category = company.category.to_uppercase();
        let title = company.company_title.as_str();
        if category.contains(Category::Opi.label()) {
            opi.insert(title);
        } else if category.contains(Category::Tpi.label()) {
            tpi.insert(title);
        }
    }
    CategoryCounts { opi: opi.len(), tpi: tpi.len() }
}

/// Region by name: exact match first, then the closest strict match.
pub fn find_region<'a>(regions: &'a [Region], name: &str) -> Option<&'a Region> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    regions.iter().find(|r| r.name == name).or_else(|| {
        similarity::best_match(name, regions, |r| r.name.as_str(), similarity::strict_similarity, REGION_NAME_THRESHOLD)
            .map(|(region, _)| region)
    })
}
