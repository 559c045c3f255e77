//! Pure booking policy decisions
//!
//! Kept free of I/O so the cancellation matrix and cascade arithmetic are
//! unit-testable without a database.

use uuid::Uuid;

use crate::booking::model::BookingStatus;

/// What a cancellation resolves to under the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Service had started (or the freelancer was committed past the start):
    /// recorded as a no-show, no refund.
    NoShow,
    /// Late cancellation inside the fee window.
    CancelledWithFee,
    /// Early cancellation, fully refundable.
    CancelledFullRefund,
}

/// Evaluate the cancellation policy at cancel time.
///
/// `minutes_until_start` is scheduled start minus now; negative means the
/// slot already began.
pub fn cancellation_outcome(
    status: BookingStatus,
    minutes_until_start: i64,
    fee_window_minutes: i64,
) -> CancelOutcome {
    if status == BookingStatus::InProgress
        || (status == BookingStatus::Assigned && minutes_until_start <= 0)
    {
        CancelOutcome::NoShow
    } else if minutes_until_start < fee_window_minutes {
        CancelOutcome::CancelledWithFee
    } else {
        CancelOutcome::CancelledFullRefund
    }
}

impl CancelOutcome {
    pub fn status(&self) -> BookingStatus {
        match self {
            CancelOutcome::NoShow => BookingStatus::NoShow,
            CancelOutcome::CancelledWithFee | CancelOutcome::CancelledFullRefund => {
                BookingStatus::Cancelled
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CancelOutcome::NoShow => "no_show",
            CancelOutcome::CancelledWithFee => "cancelled_with_fee",
            CancelOutcome::CancelledFullRefund => "cancelled_full_refund",
        }
    }
}

/// A later booking affected by an overrun, in start order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftedSlot {
    pub booking_id: Uuid,
    pub new_start_minutes: i32,
    pub new_end_minutes: i32,
}

/// Compute the overrun cascade: every later booking shifts by the overrun
/// amount. `later` must be ordered by ascending start time; the shifts are
/// produced in that order so adjacent windows stay consistent as each one
/// is applied.
pub fn cascade_shifts(overrun_minutes: i32, later: &[(Uuid, i32, i32)]) -> Vec<ShiftedSlot> {
    later
        .iter()
        .map(|&(booking_id, start, end)| ShiftedSlot {
            booking_id,
            new_start_minutes: start + overrun_minutes,
            new_end_minutes: end + overrun_minutes,
        })
        .collect()
}
