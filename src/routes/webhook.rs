//! Webhook route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/payment", post(payment_webhook))
}
