//! Booking models and request/response DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Where the service is performed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "location_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Salon,
    Home,
}

/// Booking state machine states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Assigned,
    Open,
    Unassigned,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Terminal states never transition again and do not occupy a slot.
    /// Rejected is not terminal: a rejected booking still holds its slot
    /// and can be reassigned or cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// States in which the freelancer is committed to the slot.
    pub fn occupies_freelancer(&self) -> bool {
        matches!(
            self,
            BookingStatus::Assigned | BookingStatus::Accepted | BookingStatus::InProgress
        )
    }
}

/// A customer's reserved service slot
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub store_id: Uuid,
    pub service_id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub start_minutes: i32,
    pub end_minutes: i32,
    pub location_type: LocationType,
    pub status: BookingStatus,
    pub freelancer_id: Option<Uuid>,
    pub allow_claim: bool,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a booking
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub service_id: Uuid,
    pub date: NaiveDate,
    /// "HH:mm"
    #[validate(length(min = 5, max = 5))]
    pub start_time: String,
    /// "HH:mm"; derived from the service duration when omitted
    pub end_time: Option<String>,
    pub location_type: LocationType,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Client-supplied id for idempotent creation from a payment callback
    pub booking_id: Option<Uuid>,
    /// Home bookings: try to assign the top-ranked candidate immediately
    #[serde(default)]
    pub auto_assign: bool,
    /// Customer origin for matching home bookings
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Request DTO for updating/rescheduling a booking
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBookingRequest {
    pub allow_claim: Option<bool>,
    /// "HH:mm"
    pub start_time: Option<String>,
    /// "HH:mm"
    pub end_time: Option<String>,
}

/// Request DTO for cancelling a booking
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

/// Outcome of a cancellation, with the policy flags the caller settles on
#[derive(Debug, Clone, Serialize)]
pub struct CancellationResult {
    pub booking: Booking,
    pub cancellation_fee_applied: bool,
    pub full_refund: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::NoShow.is_terminal());

        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Assigned,
            BookingStatus::Open,
            BookingStatus::Unassigned,
            BookingStatus::Accepted,
            BookingStatus::InProgress,
        ] {
            assert!(!status.is_terminal(), "{:?} must not be terminal", status);
        }
    }

    #[test]
    fn test_rejected_booking_stays_actionable() {
        // A rejection frees the freelancer but not the slot: the booking
        // can still be reassigned to someone else or cancelled.
        assert!(!BookingStatus::Rejected.is_terminal());
        assert!(!BookingStatus::Rejected.occupies_freelancer());
    }

    #[test]
    fn test_occupying_states() {
        assert!(BookingStatus::Assigned.occupies_freelancer());
        assert!(BookingStatus::Accepted.occupies_freelancer());
        assert!(BookingStatus::InProgress.occupies_freelancer());
        assert!(!BookingStatus::Pending.occupies_freelancer());
        assert!(!BookingStatus::Open.occupies_freelancer());
    }
}
