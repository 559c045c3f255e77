//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::assignment::AssignmentService;
use crate::availability::AvailabilityIndex;
use crate::booking::BookingService;
use crate::escrow::EscrowService;
use crate::ranking::RankWeights;
use crate::webhook::ReconcilerService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub booking_service: Arc<BookingService>,
    pub assignment_service: Arc<AssignmentService>,
    pub availability_index: Arc<AvailabilityIndex>,
    pub escrow_service: Arc<EscrowService>,
    pub reconciler: Arc<ReconcilerService>,
    pub rank_weights: RankWeights,
    /// Gateway identifier used to key payments, e.g. "razorpay".
    pub gateway_name: &'static str,
    pub webhook_secret: Option<String>,
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.booking_service.clone()
    }
}

impl FromRef<AppState> for Arc<AssignmentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.assignment_service.clone()
    }
}

impl FromRef<AppState> for Arc<AvailabilityIndex> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.availability_index.clone()
    }
}

impl FromRef<AppState> for Arc<EscrowService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.escrow_service.clone()
    }
}

impl FromRef<AppState> for Arc<ReconcilerService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reconciler.clone()
    }
}
