//! Availability route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn availability_routes() -> Router<AppState> {
    Router::new().route("/api/availability", get(search_availability))
}
