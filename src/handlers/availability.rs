//! Availability search handler

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::availability::model::{Candidate, FindAvailableQuery};
use crate::availability::Coordinate;
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::ranking;
use crate::state::AppState;
use crate::timewindow::parse_clock;

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub store_id: Uuid,
    pub date: NaiveDate,
    /// "HH:mm"
    pub start: String,
    pub duration_minutes: i32,
    pub service_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// GET /api/availability - Ranked candidates for a slot
pub async fn search_availability(
    State(app_state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<ApiResponse<Vec<Candidate>>>, ApiError> {
    if params.duration_minutes <= 0 {
        return Err(ApiError::ValidationError(
            "duration_minutes must be positive".to_string(),
        ));
    }

    let origin = match (params.latitude, params.longitude) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
        _ => None,
    };

    let query = FindAvailableQuery {
        date: params.date,
        start_minutes: parse_clock(&params.start)?,
        duration_minutes: params.duration_minutes,
        store_id: params.store_id,
        service_id: params.service_id,
        origin,
    };

    let candidates = app_state.availability_index.find_available(&query).await?;
    let ranked = ranking::rank(candidates, &app_state.rank_weights);

    Ok(Json(ApiResponse::ok(ranked)))
}
