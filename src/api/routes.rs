use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ReportingConfig;
use crate::storage::HitStore;

use super::handlers::{health_check, list_sites, record_hit, site_report, AppState};

pub fn create_api_router(store: Arc<dyn HitStore>, reporting: ReportingConfig) -> Router {
    let state = Arc::new(AppState { store, reporting });

    // Beacons are posted from the tracked sites' own origins
    let beacon_routes = Router::new()
        .route("/navigation", post(record_hit))
        .layer(CorsLayer::permissive())
        .with_state(Arc::clone(&state));

    let report_routes = Router::new()
        .route("/sites", get(list_sites))
        .route("/site/{hostname}", get(site_report))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/health", get(health_check))
        .merge(beacon_routes)
        .merge(report_routes)
}
