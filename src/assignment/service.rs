//! Assignment coordinator - atomic, at-most-once freelancer assignment
//!
//! Every write path that sets a booking's freelancer_id re-reads the row
//! under `FOR UPDATE` inside the same transaction that performs the write,
//! and the write itself is guarded with `freelancer_id IS NULL`. Losers of
//! a race get a `Conflict`, never a silent overwrite.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::availability::{AvailabilityIndex, FindAvailableQuery};
use crate::booking::model::Booking;
use crate::catalog::CatalogService;
use crate::error::{ApiError, ApiResult};
use crate::notifier::{EventType, Notifier, Role};
use crate::ranking::{rank, RankWeights};

use super::model::RespondAction;

#[derive(Clone)]
pub struct AssignmentService {
    db_pool: PgPool,
    availability: AvailabilityIndex,
    catalog: CatalogService,
    notifier: Arc<dyn Notifier>,
    weights: RankWeights,
}

impl AssignmentService {
    pub fn new(
        db_pool: PgPool,
        availability: AvailabilityIndex,
        catalog: CatalogService,
        notifier: Arc<dyn Notifier>,
        weights: RankWeights,
    ) -> Self {
        Self {
            db_pool,
            availability,
            catalog,
            notifier,
            weights,
        }
    }

    /// Manually assign a freelancer to a booking.
    pub async fn assign(&self, booking_id: Uuid, freelancer_id: Uuid) -> ApiResult<Booking> {
        let booking = self
            .assign_atomic(booking_id, freelancer_id, false)
            .await?;

        self.notifier
            .notify(
                Role::Freelancer,
                EventType::AssignmentRequested,
                json!({ "booking_id": booking_id, "freelancer_id": freelancer_id }),
            )
            .await;

        Ok(booking)
    }

    /// Self-claim an open booking. Requires allow_claim; the first
    /// successful transaction wins and later claimants get a 409.
    pub async fn claim(&self, booking_id: Uuid, freelancer_id: Uuid) -> ApiResult<Booking> {
        // Pre-check claimability outside the transaction for a clean 403;
        // the atomic section re-checks freelancer_id regardless.
        let booking = self.fetch_booking(booking_id).await?;
        if !booking.allow_claim {
            return Err(ApiError::Forbidden(format!(
                "Booking {} is not open for claims",
                booking_id
            )));
        }

        let booking = self.assign_atomic(booking_id, freelancer_id, true).await?;

        self.notifier
            .notify(
                Role::Owner,
                EventType::AssignmentClaimed,
                json!({ "booking_id": booking_id, "freelancer_id": freelancer_id }),
            )
            .await;

        Ok(booking)
    }

    /// A freelancer accepts or rejects their assignment.
    pub async fn respond(
        &self,
        booking_id: Uuid,
        freelancer_id: Uuid,
        action: RespondAction,
    ) -> ApiResult<Booking> {
        let mut tx = self.db_pool.begin().await?;

        let current: Option<(Uuid, Option<Uuid>)> = sqlx::query_as(
            "SELECT id, freelancer_id FROM assignments \
             WHERE booking_id = $1 AND status <> 'offered' FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (assignment_id, bound_freelancer) = current.ok_or_else(|| {
            ApiError::NotFound(format!("No assignment exists for booking {}", booking_id))
        })?;

        if let Some(bound) = bound_freelancer {
            if bound != freelancer_id {
                return Err(ApiError::Forbidden(
                    "Assignment belongs to a different freelancer".to_string(),
                ));
            }
        }

        let booking = match action {
            RespondAction::Accept => {
                // Bind the freelancer; abort if someone else holds the slot.
                let updated = sqlx::query_as::<_, Booking>(
                    r#"
                    UPDATE bookings
                    SET freelancer_id = $2, status = 'accepted', updated_at = $3
                    WHERE id = $1 AND (freelancer_id IS NULL OR freelancer_id = $2)
                    RETURNING *
                    "#,
                )
                .bind(booking_id)
                .bind(freelancer_id)
                .bind(Utc::now())
                .fetch_optional(&mut *tx)
                .await?;

                let booking = updated.ok_or_else(|| {
                    ApiError::Conflict("Booking is already assigned to someone else".to_string())
                })?;

                sqlx::query(
                    "UPDATE assignments SET freelancer_id = $2, status = 'accepted', \
                     responded_at = $3, updated_at = $3 WHERE id = $1",
                )
                .bind(assignment_id)
                .bind(freelancer_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                booking
            }
            RespondAction::Reject => {
                let booking = sqlx::query_as::<_, Booking>(
                    r#"
                    UPDATE bookings
                    SET status = 'rejected', freelancer_id = NULL, updated_at = $2
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(booking_id)
                .bind(Utc::now())
                .fetch_one(&mut *tx)
                .await?;

                sqlx::query(
                    "UPDATE assignments SET freelancer_id = $2, status = 'rejected', \
                     responded_at = $3, updated_at = $3 WHERE id = $1",
                )
                .bind(assignment_id)
                .bind(freelancer_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                booking
            }
        };

        tx.commit().await?;

        let event = match action {
            RespondAction::Accept => EventType::AssignmentAccepted,
            RespondAction::Reject => EventType::AssignmentRejected,
        };
        self.notifier
            .notify(
                Role::Owner,
                event,
                json!({ "booking_id": booking_id, "freelancer_id": freelancer_id }),
            )
            .await;

        tracing::info!(booking_id = %booking_id, freelancer_id = %freelancer_id, ?action, "Assignment response recorded");

        Ok(booking)
    }

    /// Automatic post-payment matching, invoked by the capture reconciler.
    ///
    /// Auto-assign stores get the best available candidate assigned
    /// atomically; others get a broadcast of up to `max_results` offers and
    /// the booking flipped open for claims. Zero candidates parks the
    /// booking as unassigned. Safe under duplicate webhook delivery: offer
    /// rows are keyed per (booking, freelancer) and re-inserts are no-ops.
    pub async fn auto_match(&self, booking: &Booking) -> ApiResult<()> {
        let store = self.catalog.get_store(booking.store_id).await?;

        let origin = self.catalog.store_coordinate(booking.store_id).await?;
        let query = FindAvailableQuery {
            date: booking.date,
            start_minutes: booking.start_minutes,
            duration_minutes: booking.end_minutes - booking.start_minutes,
            store_id: booking.store_id,
            service_id: Some(booking.service_id),
            origin,
        };

        let candidates = self.availability.find_available(&query).await?;
        let ranked = rank(candidates, &self.weights);

        if ranked.is_empty() {
            sqlx::query(
                "UPDATE bookings SET status = 'unassigned', updated_at = $2 \
                 WHERE id = $1 AND freelancer_id IS NULL",
            )
            .bind(booking.id)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;

            self.notifier
                .notify(
                    Role::Owner,
                    EventType::NoFreelancers,
                    json!({ "booking_id": booking.id }),
                )
                .await;

            tracing::warn!(booking_id = %booking.id, "No candidates available for auto-match");
            return Ok(());
        }

        if store.auto_assign_enabled {
            // Best candidate first; a race loss moves on to the next.
            for candidate in &ranked {
                match self
                    .assign_atomic(booking.id, candidate.freelancer_id, false)
                    .await
                {
                    Ok(_) => {
                        self.notifier
                            .notify(
                                Role::Freelancer,
                                EventType::AssignmentRequested,
                                json!({
                                    "booking_id": booking.id,
                                    "freelancer_id": candidate.freelancer_id,
                                }),
                            )
                            .await;
                        tracing::info!(
                            booking_id = %booking.id,
                            freelancer_id = %candidate.freelancer_id,
                            "Auto-assigned top candidate"
                        );
                        return Ok(());
                    }
                    Err(ApiError::Conflict(_)) => continue,
                    Err(e) => return Err(e),
                }
            }
            // Every candidate raced away; fall through to broadcast.
        }

        self.broadcast_offers(booking, &ranked).await
    }

    /// Try to assign the best-ranked candidate for a just-created home
    /// booking. Returns the winner if one was assigned.
    pub async fn try_auto_assign(
        &self,
        booking: &Booking,
        origin: Option<crate::availability::Coordinate>,
    ) -> ApiResult<Option<Uuid>> {
        let query = FindAvailableQuery {
            date: booking.date,
            start_minutes: booking.start_minutes,
            duration_minutes: booking.end_minutes - booking.start_minutes,
            store_id: booking.store_id,
            service_id: Some(booking.service_id),
            origin,
        };

        let candidates = self.availability.find_available(&query).await?;
        let ranked = rank(candidates, &self.weights);

        let Some(top) = ranked.first() else {
            return Ok(None);
        };

        match self.assign_atomic(booking.id, top.freelancer_id, false).await {
            Ok(_) => {
                self.notifier
                    .notify(
                        Role::Freelancer,
                        EventType::AssignmentRequested,
                        json!({ "booking_id": booking.id, "freelancer_id": top.freelancer_id }),
                    )
                    .await;
                Ok(Some(top.freelancer_id))
            }
            Err(ApiError::Conflict(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn broadcast_offers(
        &self,
        booking: &Booking,
        ranked: &[crate::availability::Candidate],
    ) -> ApiResult<()> {
        for candidate in ranked.iter().take(self.weights.max_results) {
            let inserted = sqlx::query(
                r#"
                INSERT INTO assignments (id, booking_id, freelancer_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, 'offered', $4, $4)
                ON CONFLICT (booking_id, freelancer_id) WHERE status = 'offered' DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(booking.id)
            .bind(candidate.freelancer_id)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;

            // Only freshly created offers notify, so duplicate webhook
            // delivery does not spam the pool.
            if inserted.rows_affected() > 0 {
                self.notifier
                    .notify(
                        Role::Freelancer,
                        EventType::AssignmentOffered,
                        json!({
                            "booking_id": booking.id,
                            "freelancer_id": candidate.freelancer_id,
                        }),
                    )
                    .await;
            }
        }

        sqlx::query(
            "UPDATE bookings SET allow_claim = TRUE, status = 'open', updated_at = $2 \
             WHERE id = $1 AND freelancer_id IS NULL",
        )
        .bind(booking.id)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        tracing::info!(
            booking_id = %booking.id,
            offers = ranked.len().min(self.weights.max_results),
            "Broadcast offers published"
        );

        Ok(())
    }

    /// The critical section. Re-reads the booking under `FOR UPDATE`,
    /// verifies the target freelancer is free in the window, and performs
    /// the compare-and-swap write, all in one transaction.
    async fn assign_atomic(
        &self,
        booking_id: Uuid,
        freelancer_id: Uuid,
        claimed: bool,
    ) -> ApiResult<Booking> {
        let mut tx = self.db_pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Booking {} not found", booking_id)))?;

        if let Some(current) = booking.freelancer_id {
            if current == freelancer_id {
                // Redundant request; already ours.
                tx.rollback().await?;
                return self.fetch_booking(booking_id).await;
            }
            return Err(ApiError::Conflict(
                "Booking is already assigned to someone else".to_string(),
            ));
        }

        if booking.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Booking {} is {:?} and cannot be assigned",
                booking_id, booking.status
            )));
        }

        self.check_freelancer_free(&mut tx, &booking, freelancer_id)
            .await?;

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET freelancer_id = $2, status = 'assigned', allow_claim = FALSE, updated_at = $3
            WHERE id = $1 AND freelancer_id IS NULL
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(freelancer_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict("Booking is already assigned to someone else".to_string())
        })?;

        // Upsert the current (non-offered) assignment row.
        let assignment_status = if claimed { "accepted" } else { "pending" };
        let touched = sqlx::query(
            r#"
            UPDATE assignments
            SET freelancer_id = $2, status = $3::assignment_status, responded_at = $4, updated_at = $4
            WHERE booking_id = $1 AND status <> 'offered'
            "#,
        )
        .bind(booking_id)
        .bind(freelancer_id)
        .bind(assignment_status)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            sqlx::query(
                r#"
                INSERT INTO assignments (id, booking_id, freelancer_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4::assignment_status, $5, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(booking_id)
            .bind(freelancer_id)
            .bind(assignment_status)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            booking_id = %booking_id,
            freelancer_id = %freelancer_id,
            claimed,
            "Freelancer assigned"
        );

        Ok(updated)
    }

    /// The target freelancer must not hold an overlapping committed booking
    /// in the same window. Runs inside the assignment transaction.
    async fn check_freelancer_free(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking: &Booking,
        freelancer_id: Uuid,
    ) -> ApiResult<()> {
        let (busy,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE freelancer_id = $1
                  AND date = $2
                  AND id <> $3
                  AND status IN ('assigned', 'accepted', 'in_progress')
                  AND start_minutes < $5
                  AND end_minutes > $4
            )
            "#,
        )
        .bind(freelancer_id)
        .bind(booking.date)
        .bind(booking.id)
        .bind(booking.start_minutes)
        .bind(booking.end_minutes)
        .fetch_one(&mut **tx)
        .await?;

        if busy {
            return Err(ApiError::Conflict(
                "Freelancer is not available in this time window".to_string(),
            ));
        }

        Ok(())
    }

    async fn fetch_booking(&self, id: Uuid) -> ApiResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Booking {} not found", id)))
    }
}
