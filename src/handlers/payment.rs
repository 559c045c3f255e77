//! Payment and escrow API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::escrow::model::{
    CreateIntentRequest, CreateIntentResponse, Payment, Payout, Refund, RefundRequest,
};
use crate::models::ApiResponse;
use crate::state::AppState;

/// POST /api/payments/intent - Create a payment intent with a pending escrow
pub async fn create_payment_intent(
    State(app_state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<ApiResponse<CreateIntentResponse>>, ApiError> {
    let response = app_state.escrow_service.create_intent(&request).await?;
    Ok(Json(ApiResponse::ok(response)))
}

/// GET /api/payments/:id - Fetch a payment
pub async fn get_payment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Payment>>, ApiError> {
    let payment = app_state.escrow_service.get_payment(id).await?;
    Ok(Json(ApiResponse::ok(payment)))
}

/// POST /api/payments/:id/release - Release the escrow into payouts
pub async fn release_payment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Payout>>>, ApiError> {
    let payouts = app_state.escrow_service.release(id).await?;
    Ok(Json(ApiResponse::ok(payouts)))
}

/// POST /api/payments/:id/refund - Refund via the gateway
pub async fn refund_payment(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<ApiResponse<Refund>>, ApiError> {
    request.validate()?;
    let refund = app_state
        .escrow_service
        .refund(id, request.amount, request.reason.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(refund)))
}
