//! Local JSON API over the registry, deposit dataset and geometry parser.

mod handlers;
mod state;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, Level};

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/regions", get(handlers::region_list))
        .route("/api/voice", get(handlers::voice))
        .route("/api/info", get(handlers::license_info))
        .route("/api/coordinates", get(handlers::coordinates))
        .route("/api/deposits", get(handlers::deposits))
        .route("/api/deposit-regions", get(handlers::deposit_regions))
        .route("/api/stats", get(handlers::region_stats))
        .route("/api/geometry", post(handlers::parse_geometry))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `listen` and serve until the process is stopped.
pub async fn start(listen: &str, state: AppState) -> Result<()> {
    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("cannot bind to {}", listen))?;

    info!(addr = %listen, "nedra server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
