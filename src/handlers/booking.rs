//! Booking API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::availability::Coordinate;
use crate::booking::model::{
    Booking, CancelBookingRequest, CancellationResult, CreateBookingRequest, LocationType,
    UpdateBookingRequest,
};
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::state::AppState;

/// POST /api/bookings - Create a booking
pub async fn create_booking(
    State(app_state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = app_state.booking_service.create(&request).await?;

    // Home bookings can ask for immediate matching; the booking stands
    // even when no candidate takes it.
    let booking = if request.auto_assign
        && booking.freelancer_id.is_none()
        && booking.location_type == LocationType::Home
    {
        let origin = match (request.latitude, request.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        };
        match app_state
            .assignment_service
            .try_auto_assign(&booking, origin)
            .await?
        {
            Some(_) => app_state.booking_service.get(booking.id).await?,
            None => booking,
        }
    } else {
        booking
    };

    Ok(Json(ApiResponse::ok(booking)))
}

/// GET /api/bookings/:id - Fetch a booking
pub async fn get_booking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = app_state.booking_service.get(id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// PATCH /api/bookings/:id - Reschedule or edit a booking
pub async fn update_booking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = app_state.booking_service.update(id, &request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// POST /api/bookings/:id/cancel - Cancel a booking under policy
pub async fn cancel_booking(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<ApiResponse<CancellationResult>>, ApiError> {
    let result = app_state.booking_service.cancel(id, &request).await?;
    Ok(Json(ApiResponse::ok(result)))
}
