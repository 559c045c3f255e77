//! Payment gateway webhook handler
//!
//! The body is taken raw so the HMAC signature is verified over the exact
//! bytes the gateway signed, before any JSON parsing.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::gateway::verify_webhook_signature;
use crate::models::ApiResponse;
use crate::state::AppState;
use crate::webhook::service::CaptureOutcome;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub gateway_ref: String,
}

/// POST /api/webhooks/payment - Signature-verified capture reconciler
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    // Fail-closed: without a configured secret every delivery is rejected.
    let Some(secret) = app_state.webhook_secret.as_deref().filter(|s| !s.is_empty()) else {
        tracing::error!("Webhook secret not configured, rejecting delivery");
        return Err(ApiError::InternalError(
            "Webhook endpoint is not configured".to_string(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !verify_webhook_signature(body.as_bytes(), signature, secret) {
        tracing::warn!("Webhook signature mismatch");
        return Err(ApiError::Forbidden("Invalid webhook signature".to_string()));
    }

    let payload: WebhookPayload = serde_json::from_str(&body)?;

    match payload.event.as_str() {
        "payment.captured" => {
            let outcome = app_state
                .reconciler
                .on_captured(app_state.gateway_name, &payload.gateway_ref)
                .await?;
            let message = match outcome {
                CaptureOutcome::Applied => "captured",
                CaptureOutcome::AlreadyCaptured => "already captured",
            };
            Ok(Json(ApiResponse::ok(message)))
        }
        other => {
            tracing::debug!(event = other, "Ignoring unhandled webhook event");
            Ok(Json(ApiResponse::ok("ignored")))
        }
    }
}

/// Health check payload
#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

/// GET /health - DB-backed health check
pub async fn health_check(pool: sqlx::PgPool) -> (StatusCode, Json<HealthResponse>) {
    let db_status = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let healthy = db_status == "connected";

    (
        if healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        },
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            database: db_status,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
