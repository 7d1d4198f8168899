use axum::extract::rejection::{QueryRejection, StringRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::{self, InfoSource};
use crate::deposits::{DepositDataset, DepositFilter, DepositRecord, RegionStats};
use crate::geometry::{self, Bounds, Coord, Ring};
use crate::registry::{find_region, Activity, Category, FetchedPolygon, LicenseInfo, RegionSummary};
use crate::session::{region_not_found, Action, Driver, Session, ViewTarget};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct HttpErrorBody {
    error: String,
    code: u16,
}

#[derive(Debug)]
pub struct HttpError(StatusCode, String);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = HttpErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<api::ApiError> for HttpError {
    fn from(e: api::ApiError) -> Self {
        let status = match e {
            api::ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            api::ApiError::Offline(_) => StatusCode::SERVICE_UNAVAILABLE,
            api::ApiError::Network(_) | api::ApiError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        };
        http_error(status, e.user_message())
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        http_error(rejection.status(), rejection.body_text())
    }
}

impl From<StringRejection> for HttpError {
    fn from(rejection: StringRejection) -> Self {
        http_error(rejection.status(), rejection.body_text())
    }
}

fn http_error(status: StatusCode, msg: impl Into<String>) -> HttpError {
    HttpError(status, msg.into())
}

fn required(param: Option<String>, name: &str) -> Result<String, HttpError> {
    param
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| http_error(StatusCode::BAD_REQUEST, format!("Missing '{}' parameter", name)))
}

// ─── GET /api/regions ────────────────────────────────────────────

pub async fn region_list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RegionSummary>>, HttpError> {
    let regions = state.regions().await?;
    Ok(Json(regions.iter().map(RegionSummary::of).collect()))
}

// ─── GET /api/voice ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VoiceQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct VoiceResponse {
    pub transcript: String,
    pub region: RegionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewTarget>,
}

pub async fn voice(
    State(state): State<Arc<AppState>>,
    query: Result<Query<VoiceQuery>, QueryRejection>,
) -> Result<Json<VoiceResponse>, HttpError> {
    let Query(params) = query?;
    let transcript = required(params.q, "q")?;
    let regions = state.regions().await?;

    // Effects are dropped; the response only reports the selection and view.
    let (session, _) = Session::new().reduce(Action::RegionsLoaded(regions));
    let (session, _) = session.reduce(Action::VoiceQuery(transcript.clone()));
    let Some(region) = session.region else {
        let notice = session.notice.unwrap_or_else(|| region_not_found(&transcript));
        return Err(http_error(StatusCode::NOT_FOUND, notice));
    };
    info!(transcript = %transcript, region = %region.name, "voice match");

    Ok(Json(VoiceResponse {
        transcript,
        region: RegionSummary::of(&region),
        view: session.view,
    }))
}

// ─── GET /api/info ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct InfoQuery {
    pub location: Option<String>,
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub location: String,
    pub info: LicenseInfo,
    pub polygon: Option<Ring>,
}

pub async fn license_info(
    State(state): State<Arc<AppState>>,
    query: Result<Query<InfoQuery>, QueryRejection>,
) -> Result<Json<InfoResponse>, HttpError> {
    let Query(params) = query?;
    let location = required(params.location, "location")?;

    let source = Arc::clone(&state.source);
    let key = location.clone();
    let info = tokio::task::spawn_blocking(move || source.fetch_info(&key))
        .await
        .map_err(|e| http_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    let polygon = info.polygon();
    Ok(Json(InfoResponse { location, info, polygon }))
}

// ─── GET /api/coordinates ────────────────────────────────────────

#[derive(Deserialize)]
pub struct CoordinatesQuery {
    pub region: Option<String>,
    pub category: Option<String>,
    pub activity: Option<String>,
}

#[derive(Serialize)]
pub struct CoordinatesResponse {
    pub region: String,
    pub companies: usize,
    pub polygons: Vec<FetchedPolygon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewTarget>,
}

pub async fn coordinates(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CoordinatesQuery>, QueryRejection>,
) -> Result<Json<CoordinatesResponse>, HttpError> {
    let Query(params) = query?;
    let name = required(params.region, "region")?;
    let category = params
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()
        .map_err(|e| http_error(StatusCode::BAD_REQUEST, e))?;
    let activity = params
        .activity
        .as_deref()
        .map(str::parse::<Activity>)
        .transpose()
        .map_err(|e| http_error(StatusCode::BAD_REQUEST, e))?;
    if activity.is_some() && category.is_none() {
        return Err(http_error(StatusCode::BAD_REQUEST, "'activity' requires 'category'"));
    }

    let regions = state.regions().await?;
    let region = find_region(&regions, &name)
        .cloned()
        .ok_or_else(|| http_error(StatusCode::NOT_FOUND, format!("Unknown region '{}'", name)))?;

    let driver = Driver::new(Arc::clone(&state.source), state.fetch_concurrency).without_delays();
    let session = driver.load_region(region, category, activity).await;

    // A category tab alone clears the selection and lists its companies.
    let companies = if category.is_some() && activity.is_none() {
        session.category_companies.len()
    } else {
        session.selected_companies.len()
    };
    debug!(region = %name, companies, polygons = session.fetched.len(), "coordinates loaded");

    Ok(Json(CoordinatesResponse {
        region: session.region.map(|r| r.name).unwrap_or_default(),
        companies,
        polygons: session.fetched,
        view: session.view,
    }))
}

// ─── GET /api/deposits ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct DepositsQuery {
    pub region: Option<String>,
}

#[derive(Serialize)]
pub struct DepositsResponse {
    /// Dataset label the filter resolved to; absent for all or none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub count: usize,
    pub bounds: Option<Bounds>,
    pub records: Vec<DepositRecord>,
}

pub async fn deposits(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DepositsQuery>, QueryRejection>,
) -> Result<Json<DepositsResponse>, HttpError> {
    let Query(params) = query?;
    let (region, records) = match DepositFilter::from_param(params.region.as_deref()) {
        DepositFilter::Region(name) => state.dataset.for_region(&name),
        other => (None, state.dataset.filter(&other)),
    };

    let bounds = DepositDataset::bounds_of(&records);
    Ok(Json(DepositsResponse {
        region,
        count: records.len(),
        bounds,
        records: records.into_iter().cloned().collect(),
    }))
}

// ─── GET /api/deposit-regions ────────────────────────────────────

pub async fn deposit_regions(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.dataset.region_labels())
}

// ─── GET /api/stats ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StatsQuery {
    pub region: Option<String>,
}

pub async fn region_stats(
    State(state): State<Arc<AppState>>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<RegionStats>, HttpError> {
    let Query(params) = query?;
    let name = required(params.region, "region")?;
    state
        .stats
        .lookup(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| http_error(StatusCode::NOT_FOUND, format!("No stats for region '{}'", name)))
}

// ─── POST /api/geometry ──────────────────────────────────────────

#[derive(Serialize)]
pub struct GeometryResponse {
    pub rings: Vec<Ring>,
    pub bounds: Option<Bounds>,
    pub center: Option<Coord>,
}

pub async fn parse_geometry(body: Result<String, StringRejection>) -> Result<Json<GeometryResponse>, HttpError> {
    let body = body?;
    let rings = geometry::parse_geometry(&body);
    let bounds = Bounds::of_rings(rings.iter().map(|r| r.as_slice()));
    Ok(Json(GeometryResponse {
        center: bounds.map(|b| b.center()),
        rings,
        bounds,
    }))
}
