//! Assignment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Offer/acceptance state of an assignment row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "assignment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Offered,
    Accepted,
    Rejected,
}

/// The freelancer-offer/response record paired with a booking.
///
/// One non-offered row tracks the current cycle; broadcast offers are
/// additional rows with status `offered`, one per invited freelancer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub freelancer_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A freelancer's answer to an offer
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RespondAction {
    Accept,
    Reject,
}

/// Request DTO for manual assignment and self-claim
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub freelancer_id: Uuid,
}

/// Request DTO for a freelancer's response
#[derive(Debug, Clone, Deserialize)]
pub struct RespondRequest {
    pub freelancer_id: Uuid,
    pub action: RespondAction,
}
