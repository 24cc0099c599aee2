// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::models::{KomootSession, Tour};
use crate::services::filter::{distance_label, filter_tours, FilterCriteria, TourDisplay};
use crate::services::naming::{assign_labels, example_filename, parse_fields, FilenameField};
use crate::services::packaging::StagingMode;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tours", post(list_tours))
        .route("/api/filename-example", get(get_filename_example))
        .route("/api/distance-label", get(get_distance_label))
        .route("/api/download", post(download_tours))
}

/// Fetch the user's tours and narrow them to `criteria`.
async fn selected_tours(
    state: &AppState,
    session: &KomootSession,
    criteria: &FilterCriteria,
) -> Result<Vec<Tour>> {
    criteria.validate().map_err(AppError::BadRequest)?;

    if criteria.types.is_empty() {
        return Ok(Vec::new());
    }

    let tours = state
        .tour_api
        .fetch_tours(session, criteria.api_type_filter())
        .await?;
    let selected = filter_tours(&tours, criteria);

    tracing::debug!(
        user_id = %session.user_id,
        fetched = tours.len(),
        selected = selected.len(),
        "Filtered tours"
    );
    Ok(selected)
}

// ─── Tour Listing ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ToursResponse {
    pub tours: Vec<TourDisplay>,
    pub total: usize,
    pub distance_label: String,
}

/// List the user's tours matching the type and distance selection.
async fn list_tours(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<KomootSession>,
    Json(criteria): Json<FilterCriteria>,
) -> Result<Json<ToursResponse>> {
    let tours = selected_tours(&state, &session, &criteria).await?;
    let rows: Vec<TourDisplay> = tours.iter().map(TourDisplay::from_tour).collect();

    Ok(Json(ToursResponse {
        total: rows.len(),
        tours: rows,
        distance_label: distance_label(criteria.min_km, criteria.max_km),
    }))
}

// ─── Form Helpers ────────────────────────────────────────────

#[derive(Deserialize)]
struct FilenameExampleQuery {
    /// Comma-separated field list; absent means the default selection
    fields: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FilenameExampleResponse {
    pub fields: Vec<FilenameField>,
    pub example: String,
}

/// Preview the file name a field selection produces.
async fn get_filename_example(
    Query(params): Query<FilenameExampleQuery>,
) -> Result<Json<FilenameExampleResponse>> {
    let fields = match params.fields.as_deref() {
        Some(raw) => parse_fields(raw).map_err(AppError::BadRequest)?,
        None => FilenameField::DEFAULT_SELECTION.to_vec(),
    };

    Ok(Json(FilenameExampleResponse {
        example: example_filename(&fields),
        fields,
    }))
}

#[derive(Deserialize)]
struct DistanceLabelQuery {
    #[serde(default)]
    min_km: f64,
    #[serde(default = "default_max_km")]
    max_km: f64,
}

fn default_max_km() -> f64 {
    crate::services::filter::DISTANCE_CEILING_KM
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DistanceLabelResponse {
    pub label: String,
}

async fn get_distance_label(Query(params): Query<DistanceLabelQuery>) -> Json<DistanceLabelResponse> {
    Json(DistanceLabelResponse {
        label: distance_label(params.min_km, params.max_km),
    })
}

// ─── Download ────────────────────────────────────────────────

fn default_fields() -> Vec<FilenameField> {
    FilenameField::DEFAULT_SELECTION.to_vec()
}

#[derive(Deserialize)]
pub struct DownloadRequest {
    #[serde(flatten)]
    pub criteria: FilterCriteria,
    /// File name fields, in order. Empty yields the fallback name.
    #[serde(default = "default_fields")]
    pub fields: Vec<FilenameField>,
    /// Restrict the download to these tours (must also match the criteria)
    #[serde(default)]
    pub tour_ids: Option<Vec<String>>,
    #[serde(default)]
    pub staging: StagingMode,
}

/// Package the selected tours into a zip archive.
async fn download_tours(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<KomootSession>,
    Json(body): Json<DownloadRequest>,
) -> Result<Response> {
    if body.staging == StagingMode::Remote && !state.pipeline.supports_remote() {
        return Err(AppError::BadRequest(
            "Remote staging is not configured on this server".to_string(),
        ));
    }

    let mut tours = selected_tours(&state, &session, &body.criteria).await?;
    if let Some(ids) = &body.tour_ids {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        tours.retain(|t| wanted.contains(t.id.as_str()));
    }

    if tours.is_empty() {
        return Err(AppError::BadRequest(
            "No tours match the selection".to_string(),
        ));
    }

    let packaged = assign_labels(tours, &body.fields);

    tracing::info!(
        user_id = %session.user_id,
        tours = packaged.len(),
        staging = ?body.staging,
        "Download requested"
    );

    let bundle = state.pipeline.run(&session, &packaged, body.staging).await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        bundle.file_name
    ))
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid download name: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bundle.bytes,
    )
        .into_response())
}
