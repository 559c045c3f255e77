//! Escrow service layer - settlement business logic

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::booking::model::Booking;
use crate::commission::CommissionService;
use crate::error::{ApiError, ApiResult};
use crate::escrow::model::{
    CreateIntentRequest, CreateIntentResponse, Escrow, Payment, Payout, PayoutPayee, Refund,
};
use crate::gateway::PaymentGateway;

/// Escrow settlement service
#[derive(Clone)]
pub struct EscrowService {
    db_pool: PgPool,
    commission: CommissionService,
    gateway: Arc<dyn PaymentGateway>,
}

impl EscrowService {
    pub fn new(
        db_pool: PgPool,
        commission: CommissionService,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db_pool,
            commission,
            gateway,
        }
    }

    /// Create a payment intent for a booking: gateway order first, then the
    /// local payment row and its pending escrow. A gateway failure leaves
    /// no local state behind.
    pub async fn create_intent(
        &self,
        request: &CreateIntentRequest,
    ) -> ApiResult<CreateIntentResponse> {
        request.validate()?;

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(request.booking_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Booking {} not found", request.booking_id))
            })?;

        let total = request.amount + request.tax;

        let order = self
            .gateway
            .create_order(
                total,
                &request.currency,
                json!({ "booking_id": booking.id }),
            )
            .await?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, booking_id, store_id, service_id, freelancer_id,
                amount, tax, total, currency, gateway, gateway_ref, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'created', $12, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.id)
        .bind(booking.store_id)
        .bind(booking.service_id)
        .bind(booking.freelancer_id)
        .bind(request.amount)
        .bind(request.tax)
        .bind(total)
        .bind(&request.currency)
        .bind(self.gateway.name())
        .bind(&order.gateway_order_id)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        self.create_escrow(payment.id).await?;

        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking.id,
            total,
            "Payment intent created, escrow pending"
        );

        Ok(CreateIntentResponse {
            payment,
            gateway_order_id: order.gateway_order_id,
        })
    }

    /// Create the pending escrow hold for a payment.
    pub async fn create_escrow(&self, payment_id: Uuid) -> ApiResult<Escrow> {
        let escrow = sqlx::query_as::<_, Escrow>(
            r#"
            INSERT INTO escrows (id, payment_id, status, created_at)
            VALUES ($1, $2, 'pending', $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ApiError::Conflict(format!("Escrow already exists for payment {}", payment_id))
            }
            other => other.into(),
        })?;

        Ok(escrow)
    }

    /// Release a pending escrow: resolve the commission split and create
    /// one payout per nonzero payee. The pending-to-released flip is the
    /// guard, so releasing twice fails rather than double-paying.
    ///
    /// The freelancer share goes to whoever holds the booking at release
    /// time, not whoever held it (if anyone) when the intent was created.
    /// Prepaid home bookings are matched after capture, so the intent-time
    /// snapshot is usually empty.
    pub async fn release(&self, payment_id: Uuid) -> ApiResult<Vec<Payout>> {
        let payment = self.get_payment(payment_id).await?;

        let (current_freelancer,): (Option<Uuid>,) =
            sqlx::query_as("SELECT freelancer_id FROM bookings WHERE id = $1")
                .bind(payment.booking_id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Booking {} not found", payment.booking_id))
                })?;

        let split = self
            .commission
            .resolve(
                payment.amount,
                payment.store_id,
                Some(payment.service_id),
                current_freelancer,
            )
            .await?;

        let mut tx = self.db_pool.begin().await?;

        let released: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE escrows
            SET status = 'released', released_at = $2
            WHERE payment_id = $1 AND status = 'pending'
            RETURNING id
            "#,
        )
        .bind(payment_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((escrow_id,)) = released else {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM escrows WHERE payment_id = $1")
                    .bind(payment_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(_) => ApiError::Conflict(format!(
                    "Escrow for payment {} is not pending",
                    payment_id
                )),
                None => ApiError::NotFound(format!("No escrow for payment {}", payment_id)),
            });
        };

        // A booking still unstaffed at release has no freelancer to pay;
        // the platform absorbs that share.
        let (freelancer_share, platform_share) = match current_freelancer {
            Some(_) => (split.freelancer_share, split.platform_share),
            None => (0, split.platform_share + split.freelancer_share),
        };

        let entries = [
            (PayoutPayee::Store, Some(payment.store_id), split.store_share),
            (PayoutPayee::Freelancer, current_freelancer, freelancer_share),
            (PayoutPayee::Platform, None, platform_share),
        ];

        let mut payouts = Vec::new();
        for (payee, payee_id, amount) in entries {
            if amount == 0 {
                continue;
            }
            let payout = sqlx::query_as::<_, Payout>(
                r#"
                INSERT INTO payouts (id, escrow_id, payee, payee_id, amount, status, created_at)
                VALUES ($1, $2, $3, $4, $5, 'pending', $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(escrow_id)
            .bind(payee)
            .bind(payee_id)
            .bind(amount)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
            payouts.push(payout);
        }

        tx.commit().await?;

        tracing::info!(
            payment_id = %payment_id,
            escrow_id = %escrow_id,
            payouts = payouts.len(),
            rule = ?split.rule_used,
            "Escrow released"
        );

        Ok(payouts)
    }

    /// Refund a payment. The payment row stays locked across the gateway
    /// call, so a concurrent refund waits and then fails the status check
    /// instead of moving money out twice. A gateway failure rolls back
    /// with local state untouched. An already-released escrow is not
    /// reversed here.
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: i64,
        reason: Option<&str>,
    ) -> ApiResult<Refund> {
        let mut tx = self.db_pool.begin().await?;

        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Payment {} not found", payment_id)))?;

        if payment.status == crate::escrow::model::PaymentStatus::Refunded {
            return Err(ApiError::Conflict(format!(
                "Payment {} is already refunded",
                payment_id
            )));
        }

        let gateway_refund = self
            .gateway
            .refund(&payment.gateway_ref, amount, reason)
            .await?;

        let refund = sqlx::query_as::<_, Refund>(
            r#"
            INSERT INTO refunds (id, payment_id, amount, reason, gateway_refund_ref, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(payment_id)
        .bind(amount)
        .bind(reason)
        .bind(&gateway_refund.gateway_refund_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let flipped = sqlx::query(
            "UPDATE payments SET status = 'refunded', updated_at = $2 WHERE id = $1 AND status <> 'refunded'",
        )
        .bind(payment_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            return Err(ApiError::Conflict(format!(
                "Payment {} is already refunded",
                payment_id
            )));
        }

        tx.commit().await?;

        tracing::info!(
            payment_id = %payment_id,
            amount,
            gateway_refund_ref = %gateway_refund.gateway_refund_id,
            "Refund recorded"
        );

        Ok(refund)
    }

    pub async fn get_payment(&self, id: Uuid) -> ApiResult<Payment> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Payment {} not found", id)))
    }

    pub async fn find_by_gateway_ref(
        &self,
        gateway: &str,
        gateway_ref: &str,
    ) -> ApiResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE gateway = $1 AND gateway_ref = $2",
        )
        .bind(gateway)
        .bind(gateway_ref)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(payment)
    }

    /// Flip a payment created -> captured. Returns true only when this call
    /// performed the flip, so duplicate webhook deliveries observe false
    /// and skip their side effects.
    pub async fn mark_captured(&self, payment_id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'captured', updated_at = $2 \
             WHERE id = $1 AND status = 'created'",
        )
        .bind(payment_id)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
