//! Session state for one dashboard user, advanced by a pure reducer.
//!
//! `Session::reduce` never performs I/O. Work it wants done comes back as
//! [`Effect`]s; the caller runs them and feeds the outcome back in as
//! another [`Action`].

use crate::api::merge_polygons;
use crate::deposits::{DepositDataset, DepositFilter, DepositRecord};
use crate::geometry::{Bounds, Coord, Ring};
use crate::registry::{
    filter_by_activity, filter_by_category, Activity, Category, Company, FetchedPolygon, LicenseInfo, Region,
};
use crate::similarity;
use serde::Serialize;
use std::time::Duration;

/// Pause between flying to a parcel and outlining it.
pub const HIGHLIGHT_DELAY: Duration = Duration::from_millis(1300);

pub const FOCUS_ZOOM: u8 = 15;
pub const VOICE_ZOOM: u8 = 9;
pub const DEPOSIT_ZOOM: u8 = 12;

/// Notice shown when a voice query names no known region.
pub fn region_not_found(transcript: &str) -> String {
    format!("Регион не найден: {}", transcript.trim())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CategoryTab {
    #[default]
    Default,
    Opi,
    Tpi,
}

impl CategoryTab {
    pub fn category(self) -> Option<Category> {
        match self {
            Self::Default => None,
            Self::Opi => Some(Category::Opi),
            Self::Tpi => Some(Category::Tpi),
        }
    }
}

impl From<Option<Category>> for CategoryTab {
    fn from(c: Option<Category>) -> Self {
        match c {
            None => Self::Default,
            Some(Category::Opi) => Self::Opi,
            Some(Category::Tpi) => Self::Tpi,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ActivityTab {
    #[default]
    Default,
    Exploration,
    Extraction,
}

impl ActivityTab {
    pub fn activity(self) -> Option<Activity> {
        match self {
            Self::Default => None,
            Self::Exploration => Some(Activity::Exploration),
            Self::Extraction => Some(Activity::Extraction),
        }
    }
}

impl From<Option<Activity>> for ActivityTab {
    fn from(a: Option<Activity>) -> Self {
        match a {
            None => Self::Default,
            Some(Activity::Exploration) => Self::Exploration,
            Some(Activity::Extraction) => Self::Extraction,
        }
    }
}

/// Where the map should move next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewTarget {
    Center { center: Coord, zoom: u8 },
    Fit(Bounds),
}

/// The deposit side panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositPanel {
    pub visible: bool,
    pub filter: DepositFilter,
    pub selected: Option<DepositRecord>,
}

impl Default for DepositPanel {
    fn default() -> Self {
        Self {
            visible: true,
            filter: DepositFilter::Hidden,
            selected: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    RegionsLoaded(Vec<Region>),
    SelectRegion(Region),
    VoiceQuery(String),
    SelectCategory(CategoryTab),
    SelectActivity(ActivityTab),
    FocusCompany(Company),
    /// Outcome of a [`Effect::FetchInfo`]; the error is the user-facing string.
    InfoLoaded {
        company: Company,
        result: Result<LicenseInfo, String>,
    },
    HighlightElapsed(Ring),
    CoordinatesLoaded(Vec<FetchedPolygon>),
    ClearFetched,
    CloseInfo,
    ToggleDeposits,
    HideDeposits,
    SetDepositFilter(DepositFilter),
    SelectDeposit { record: DepositRecord, ring: usize },
    CloseDeposit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchAll(Vec<Company>),
    FetchInfo(Company),
    Highlight { ring: Ring, after: Duration },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    pub regions: Vec<Region>,
    pub region: Option<Region>,
    pub category_tab: CategoryTab,
    pub activity_tab: ActivityTab,
    /// Region companies narrowed by the category tab.
    pub category_companies: Vec<Company>,
    pub selected_companies: Vec<Company>,
    pub current_company: Option<Company>,
    pub info: Option<LicenseInfo>,
    pub info_visible: bool,
    pub error: Option<String>,
    /// Shown when a voice query names no known region.
    pub notice: Option<String>,
    pub fetched: Vec<FetchedPolygon>,
    pub highlighted: Option<Ring>,
    pub view: Option<ViewTarget>,
    pub deposits: DepositPanel,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one action, returning the next session and the effects to run.
    pub fn reduce(mut self, action: Action) -> (Self, Vec<Effect>) {
        let mut effects = Vec::new();

        match action {
            Action::RegionsLoaded(regions) => {
                self.regions = regions;
            }
            Action::SelectRegion(region) => {
                self.select_region(region, &mut effects);
            }
            Action::VoiceQuery(transcript) => {
                let found = similarity::match_by_voice(&transcript, &self.regions, |r| r.name.as_str())
                    .map(|(region, _)| region.clone());
                match found {
                    Some(region) => {
                        let center = Bounds::of_ring(&region.coordinates).map(|b| b.center());
                        self.notice = None;
                        self.select_region(region, &mut effects);
                        if let Some(center) = center {
                            self.view = Some(ViewTarget::Center { center, zoom: VOICE_ZOOM });
                        }
                    }
                    None => {
                        self.notice = Some(region_not_found(&transcript));
                    }
                }
            }
            Action::SelectCategory(tab) => {
                self.category_tab = tab;
                self.activity_tab = ActivityTab::Default;
                self.category_companies = match (tab.category(), &self.region) {
                    (Some(category), Some(region)) => filter_by_category(region, category),
                    _ => Vec::new(),
                };
                self.set_selected(Vec::new());
                let companies = self.category_companies.clone();
                self.fetch_all(companies, &mut effects);
            }
            Action::SelectActivity(tab) => {
                self.activity_tab = tab;
                if let Some(activity) = tab.activity() {
                    let companies = filter_by_activity(&self.category_companies, activity);
                    self.set_selected(companies.clone());
                    self.fetch_all(companies, &mut effects);
                }
            }
            Action::FocusCompany(company) => {
                self.current_company = Some(company.clone());
                effects.push(Effect::FetchInfo(company));
            }
            Action::InfoLoaded { company, result } => match result {
                Err(message) => {
                    self.info_visible = false;
                    self.error = Some(message);
                }
                Ok(info) => {
                    self.error = None;
                    self.info_visible = true;
                    let fetched = FetchedPolygon::from_info(&company, info.clone());
                    self.info = Some(info);
                    if let Some(polygon) = fetched {
                        if let Some(bounds) = Bounds::of_ring(&polygon.coordinates) {
                            self.view = Some(ViewTarget::Center { center: bounds.center(), zoom: FOCUS_ZOOM });
                        }
                        effects.push(Effect::Highlight {
                            ring: polygon.coordinates.clone(),
                            after: HIGHLIGHT_DELAY,
                        });
                        merge_polygons(&mut self.fetched, vec![polygon]);
                    }
                }
            },
            Action::HighlightElapsed(ring) => {
                self.highlighted = Some(ring);
            }
            Action::CoordinatesLoaded(polygons) => {
                let bounds = Bounds::of_rings(polygons.iter().map(|p| p.coordinates.as_slice()));
                merge_polygons(&mut self.fetched, polygons);
                if let Some(bounds) = bounds {
                    self.view = Some(ViewTarget::Fit(bounds));
                }
            }
            Action::ClearFetched => {
                self.fetched.clear();
            }
            Action::CloseInfo => {
                self.info_visible = false;
            }
            Action::ToggleDeposits => {
                self.deposits.visible = !self.deposits.visible;
            }
            Action::HideDeposits => {
                self.deposits.visible = false;
                self.deposits.filter = DepositFilter::Hidden;
            }
            Action::SetDepositFilter(filter) => {
                self.deposits.filter = filter;
            }
            Action::SelectDeposit { record, ring } => {
                self.info_visible = false;
                if let Some(bounds) = record.rings.get(ring).and_then(|r| Bounds::of_ring(r)) {
                    self.view = Some(ViewTarget::Center { center: bounds.center(), zoom: DEPOSIT_ZOOM });
                }
                self.deposits.selected = Some(record);
            }
            Action::CloseDeposit => {
                self.deposits.selected = None;
            }
        }

        (self, effects)
    }

    fn select_region(&mut self, region: Region, effects: &mut Vec<Effect>) {
        self.deposits.filter = if region.name.is_empty() {
            DepositFilter::Hidden
        } else {
            DepositFilter::Region(region.name.clone())
        };
        self.set_selected(region.companies.clone());
        let companies = region.companies.clone();
        self.region = Some(region);
        self.fetch_all(companies, effects);
    }

    /// Replacing the selection always dismisses the focused license.
    fn set_selected(&mut self, companies: Vec<Company>) {
        self.selected_companies = companies;
        self.info = None;
        self.info_visible = false;
    }

    fn fetch_all(&mut self, companies: Vec<Company>, effects: &mut Vec<Effect>) {
        if companies.is_empty() {
            return;
        }
        self.error = None;
        effects.push(Effect::FetchAll(companies));
    }

    /// Deposit rows the panel currently lists.
    ///
    /// Region filters coming from the API are reconciled against the
    /// dataset's own labels.
    pub fn visible_deposits<'a>(&self, dataset: &'a DepositDataset) -> Vec<&'a DepositRecord> {
        if !self.deposits.visible {
            return Vec::new();
        }
        self.filtered_deposits(dataset)
    }

    /// Deposit rows for the current filter, whether or not the panel is open.
    pub fn filtered_deposits<'a>(&self, dataset: &'a DepositDataset) -> Vec<&'a DepositRecord> {
        match &self.deposits.filter {
            DepositFilter::Region(name) => dataset.for_region(name).1,
            other => dataset.filter(other),
        }
    }

    /// View covering every listed deposit outline.
    pub fn deposits_view(&self, dataset: &DepositDataset) -> Option<ViewTarget> {
        DepositDataset::bounds_of(&self.visible_deposits(dataset)).map(ViewTarget::Fit)
    }
}
