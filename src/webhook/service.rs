//! Webhook reconciler - capture events from the payment gateway

use std::sync::Arc;

use serde_json::json;

use crate::assignment::AssignmentService;
use crate::booking::BookingService;
use crate::error::{ApiError, ApiResult};
use crate::escrow::model::Payment;
use crate::escrow::EscrowService;
use crate::notifier::{EventType, Notifier, Role};

/// Outcome of processing a capture event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// This delivery performed the capture and its side effects ran.
    Applied,
    /// The payment was already captured; nothing was done.
    AlreadyCaptured,
}

#[derive(Clone)]
pub struct ReconcilerService {
    escrow: EscrowService,
    booking: BookingService,
    assignment: AssignmentService,
    notifier: Arc<dyn Notifier>,
}

impl ReconcilerService {
    pub fn new(
        escrow: EscrowService,
        booking: BookingService,
        assignment: AssignmentService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            escrow,
            booking,
            assignment,
            notifier,
        }
    }

    /// Reconcile a `payment.captured` event. The payment status flip is
    /// the idempotency gate: only the delivery that wins the flip runs
    /// confirmation, notification and auto-matching.
    pub async fn on_captured(
        &self,
        gateway: &str,
        gateway_ref: &str,
    ) -> ApiResult<CaptureOutcome> {
        let payment = self
            .escrow
            .find_by_gateway_ref(gateway, gateway_ref)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "No payment for gateway ref {} ({})",
                    gateway_ref, gateway
                ))
            })?;

        if !self.escrow.mark_captured(payment.id).await? {
            tracing::info!(
                payment_id = %payment.id,
                gateway_ref,
                "Duplicate capture event ignored"
            );
            return Ok(CaptureOutcome::AlreadyCaptured);
        }

        self.run_capture_side_effects(&payment).await?;

        Ok(CaptureOutcome::Applied)
    }

    async fn run_capture_side_effects(&self, payment: &Payment) -> ApiResult<()> {
        let booking = self.booking.confirm_if_earlier(payment.booking_id).await?;

        self.notifier
            .notify(
                Role::Customer,
                EventType::PaymentCaptured,
                json!({
                    "booking_id": booking.id,
                    "payment_id": payment.id,
                    "total": payment.total,
                }),
            )
            .await;

        if booking.freelancer_id.is_none() {
            tracing::info!(
                booking_id = %booking.id,
                "Captured booking has no freelancer, starting auto-match"
            );
            self.assignment.auto_match(&booking).await?;
        }

        Ok(())
    }
}
