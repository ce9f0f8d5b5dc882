use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ReportingConfig;
use crate::models::{Hit, NewHit};
use crate::reduce::{self, FieldSet, ReduceError, ReduceField, ReduceResult};
use crate::storage::{HitStore, StorageError};

pub struct AppState {
    pub store: Arc<dyn HitStore>,
    pub reporting: ReportingConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: String, kind: Option<&'static str>) -> ApiError {
    (status, Json(ErrorResponse { error, kind }))
}

impl From<ReduceError> for ApiError {
    fn from(err: ReduceError) -> Self {
        let status = match err {
            ReduceError::UnknownField(_)
            | ReduceError::UnknownStatistic(_)
            | ReduceError::RangeTooLarge { .. } => StatusCode::BAD_REQUEST,
            ReduceError::InvalidDateRange { .. } | ReduceError::Statistic(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, err.to_string(), Some(err.kind()))
    }
}

/// Query string of a site report.
#[derive(Debug, Default, Deserialize)]
pub struct SiteQuery {
    /// Defaults to `end` minus the configured number of days
    pub start: Option<DateTime<Utc>>,
    /// Defaults to now
    pub end: Option<DateTime<Utc>>,
    /// Comma separated aggregate names; every aggregate when omitted
    pub fields: Option<String>,
    /// Comma separated statistic names for navigation timing
    pub calculate: Option<String>,
    pub percentile: Option<f64>,
}

/// Record a beacon hit
pub async fn record_hit(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewHit>,
) -> Result<(StatusCode, Json<Hit>), ApiError> {
    let hit = payload.into_hit(Utc::now());

    match state.store.insert_hit(&hit).await {
        Ok(()) => Ok((StatusCode::CREATED, Json(hit))),
        Err(StorageError::MissingHostname) => Err(error_response(
            StatusCode::BAD_REQUEST,
            "hostname is required".to_string(),
            None,
        )),
        Err(e) => {
            tracing::error!("Failed to store hit: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store hit".to_string(),
                None,
            ))
        }
    }
}

/// Aggregate the hits of one site
pub async fn site_report(
    State(state): State<Arc<AppState>>,
    Path(hostname): Path<String>,
    Query(query): Query<SiteQuery>,
) -> Result<Json<ReduceResult>, ApiError> {
    let fields: FieldSet = match query.fields.as_deref() {
        Some(list) => reduce::parse_fields(list)?,
        None => ReduceField::ALL.into_iter().collect(),
    };

    let mut options = state.reporting.reduce_options().map_err(|e| {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
    })?;
    if let Some(list) = query.calculate.as_deref() {
        options.navigation.calculate = reduce::parse_statistics(list)?;
    }
    if let Some(percentile) = query.percentile {
        options.navigation.percentile = percentile;
    }

    let end = query.end.unwrap_or_else(Utc::now);
    let start = query
        .start
        .unwrap_or_else(|| end - TimeDelta::days(state.reporting.default_days as i64));
    if start > end {
        return Err(ReduceError::InvalidDateRange {
            instant: start,
            start,
            end,
        }
        .into());
    }
    let days = (end - start).num_days();
    if days > i64::from(state.reporting.max_days) {
        return Err(ReduceError::RangeTooLarge {
            days,
            max_days: state.reporting.max_days,
        }
        .into());
    }
    options.start = Some(start);
    options.end = Some(end);

    let hits = state
        .store
        .hits_for_host(&hostname, start, end)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load hits for {}: {}", hostname, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load hits".to_string(),
                None,
            )
        })?;

    match reduce::map_reduce(&hits, &fields, &options).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!("/site/{}: {}", hostname, e);
            Err(e.into())
        }
    }
}

/// List hostnames with recorded hits
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    match state.store.hostnames().await {
        Ok(hostnames) => Ok(Json(hostnames)),
        Err(e) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list sites: {}", e),
            None,
        )),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
