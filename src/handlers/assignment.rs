//! Assignment API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::assignment::model::{AssignRequest, RespondRequest};
use crate::booking::model::Booking;
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::state::AppState;

/// POST /api/bookings/:id/assign - Owner assigns a freelancer
pub async fn assign_booking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = app_state
        .assignment_service
        .assign(id, request.freelancer_id)
        .await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// POST /api/bookings/:id/claim - Freelancer claims an open booking
pub async fn claim_booking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = app_state
        .assignment_service
        .claim(id, request.freelancer_id)
        .await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// POST /api/bookings/:id/respond - Freelancer accepts or rejects
pub async fn respond_booking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RespondRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = app_state
        .assignment_service
        .respond(id, request.freelancer_id, request.action)
        .await?;
    Ok(Json(ApiResponse::ok(booking)))
}
