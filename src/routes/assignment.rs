//! Assignment route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn assignment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings/:id/assign", post(assign_booking))
        .route("/api/bookings/:id/claim", post(claim_booking))
        .route("/api/bookings/:id/respond", post(respond_booking))
}
