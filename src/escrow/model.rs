//! Payment and settlement models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Payment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Captured,
    Refunded,
}

/// A payment tied to a booking, in gateway minor units
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub store_id: Uuid,
    pub service_id: Uuid,
    pub freelancer_id: Option<Uuid>,
    pub amount: i64,
    pub tax: i64,
    pub total: i64,
    pub currency: String,
    pub gateway: String,
    pub gateway_ref: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Held-funds state of a payment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "escrow_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    Pending,
    Released,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Escrow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

/// Who a payout goes to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payout_payee", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutPayee {
    Store,
    Freelancer,
    Platform,
}

/// A per-payee disbursement record, immutable once created
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payout {
    pub id: Uuid,
    pub escrow_id: Uuid,
    pub payee: PayoutPayee,
    pub payee_id: Option<Uuid>,
    pub amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Refund {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub amount: i64,
    pub reason: Option<String>,
    pub gateway_refund_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a payment intent for a booking
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIntentRequest {
    pub booking_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(range(min = 0))]
    pub tax: i64,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
}

/// Response DTO for a created payment intent
#[derive(Debug, Clone, Serialize)]
pub struct CreateIntentResponse {
    pub payment: Payment,
    pub gateway_order_id: String,
}

/// Request DTO for a refund
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefundRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
    pub reason: Option<String>,
}
