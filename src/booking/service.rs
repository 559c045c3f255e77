//! Booking service - lifecycle business logic

use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::booking::model::{
    Booking, BookingStatus, CancelBookingRequest, CancellationResult, CreateBookingRequest,
    LocationType, UpdateBookingRequest,
};
use crate::booking::policy::{cancellation_outcome, cascade_shifts, CancelOutcome};
use crate::catalog::CatalogService;
use crate::error::{ApiError, ApiResult};
use crate::notifier::{EventType, Notifier, Role};
use crate::timewindow::{fits_in_day, parse_clock, with_buffer};

/// Fallback duration when a service row carries none.
const FALLBACK_DURATION_MINUTES: i32 = 60;

/// Booking lifecycle service
#[derive(Clone)]
pub struct BookingService {
    db_pool: PgPool,
    catalog: CatalogService,
    notifier: Arc<dyn Notifier>,
    buffer_minutes: i32,
    fee_window_minutes: i64,
}

impl BookingService {
    pub fn new(
        db_pool: PgPool,
        catalog: CatalogService,
        notifier: Arc<dyn Notifier>,
        buffer_minutes: i32,
        fee_window_minutes: i64,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            notifier,
            buffer_minutes,
            fee_window_minutes,
        }
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Booking {} not found", id)))
    }

    /// Create a booking.
    ///
    /// Salon bookings are auto-staffed with the store's first active
    /// freelancer when one exists; home bookings start unstaffed. Retrying
    /// with the same client-supplied id returns the existing booking
    /// instead of creating a duplicate, since the payment-success callback
    /// that drives this path may be delivered more than once.
    pub async fn create(&self, request: &CreateBookingRequest) -> ApiResult<Booking> {
        request.validate()?;

        // Idempotent retry: same client-supplied id, same booking back.
        if let Some(client_id) = request.booking_id {
            if let Some(existing) =
                sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
                    .bind(client_id)
                    .fetch_optional(&self.db_pool)
                    .await?
            {
                tracing::debug!(booking_id = %client_id, "Idempotent create, returning existing booking");
                return Ok(existing);
            }
        }

        let service = self.catalog.get_service(request.service_id).await?;

        if request.location_type == LocationType::Home && !service.home_allowed {
            return Err(ApiError::ValidationError(format!(
                "Service '{}' does not allow home visits",
                service.name
            )));
        }

        let start_minutes = parse_clock(&request.start_time)?;
        let end_minutes = match &request.end_time {
            Some(end) => parse_clock(end)?,
            None => {
                let duration = if service.duration_minutes > 0 {
                    service.duration_minutes
                } else {
                    FALLBACK_DURATION_MINUTES
                };
                start_minutes + duration
            }
        };

        if end_minutes <= start_minutes {
            return Err(ApiError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }

        self.check_buffer_conflict(request.store_id, request.date, start_minutes, end_minutes)
            .await?;

        // Salon bookings are staffed immediately when the store has anyone
        // active; a storeless roster leaves the booking pending rather than
        // failing the customer.
        let auto_staff = match request.location_type {
            LocationType::Salon => self.catalog.first_active_staff(request.store_id).await?,
            LocationType::Home => None,
        };

        let status = if auto_staff.is_some() {
            BookingStatus::Assigned
        } else {
            BookingStatus::Pending
        };

        let booking_id = request.booking_id.unwrap_or_else(Uuid::new_v4);
        let notes = request.notes.clone().unwrap_or_default();

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                id, store_id, service_id, user_id, date, start_minutes, end_minutes,
                location_type, status, freelancer_id, allow_claim, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11, $12, $12)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(request.store_id)
        .bind(request.service_id)
        .bind(request.user_id)
        .bind(request.date)
        .bind(start_minutes)
        .bind(end_minutes)
        .bind(request.location_type)
        .bind(status)
        .bind(auto_staff)
        .bind(&notes)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        // Paired assignment row: accepted when auto-staffed, else pending.
        let assignment_status = if auto_staff.is_some() {
            "accepted"
        } else {
            "pending"
        };
        sqlx::query(
            r#"
            INSERT INTO assignments (id, booking_id, freelancer_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4::assignment_status, $5, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.id)
        .bind(auto_staff)
        .bind(assignment_status)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        let recipient = match request.location_type {
            LocationType::Salon => Role::Owner,
            LocationType::Home => Role::Freelancer,
        };
        self.notifier
            .notify(
                recipient,
                EventType::BookingCreated,
                json!({ "booking_id": booking.id, "date": booking.date }),
            )
            .await;

        tracing::info!(
            booking_id = %booking.id,
            store_id = %booking.store_id,
            status = ?booking.status,
            "Booking created"
        );

        Ok(booking)
    }

    /// Reject creation when the buffered interval overlaps any non-terminal
    /// booking at the same store and date.
    async fn check_buffer_conflict(
        &self,
        store_id: Uuid,
        date: chrono::NaiveDate,
        start_minutes: i32,
        end_minutes: i32,
    ) -> ApiResult<()> {
        let (buffered_start, buffered_end) =
            with_buffer(start_minutes, end_minutes, self.buffer_minutes);

        let (conflict,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE store_id = $1
                  AND date = $2
                  AND status NOT IN ('completed', 'cancelled', 'no_show')
                  AND start_minutes < $4
                  AND end_minutes > $3
            )
            "#,
        )
        .bind(store_id)
        .bind(date)
        .bind(buffered_start)
        .bind(buffered_end)
        .fetch_one(&self.db_pool)
        .await?;

        if conflict {
            return Err(ApiError::Conflict(format!(
                "Slot conflict: another booking within {} minutes of the requested window",
                self.buffer_minutes
            )));
        }

        Ok(())
    }

    /// Cancel a booking, branching on the policy in `policy::cancellation_outcome`.
    ///
    /// The policy is evaluated against the row as locked inside the
    /// transaction, so a concurrent cancel or status change serializes
    /// behind this one instead of double-committing.
    pub async fn cancel(
        &self,
        id: Uuid,
        request: &CancelBookingRequest,
    ) -> ApiResult<CancellationResult> {
        let mut tx = self.db_pool.begin().await?;

        let booking =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Booking {} not found", id)))?;

        if booking.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Booking {} is already {:?}",
                id, booking.status
            )));
        }

        let now = Utc::now().naive_utc();
        let start_at = booking.date.and_time(
            NaiveTime::from_num_seconds_from_midnight_opt(
                (booking.start_minutes.max(0) as u32) * 60,
                0,
            )
            .unwrap_or(NaiveTime::MIN),
        );
        let minutes_until_start = (start_at - now).num_minutes();

        let outcome =
            cancellation_outcome(booking.status, minutes_until_start, self.fee_window_minutes);

        let reason = request.reason.as_deref().unwrap_or("unspecified");
        let memo = format!(
            "\n[cancelled {}] outcome={} reason={}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            outcome.as_str(),
            reason
        );

        let freed_freelancer = booking.freelancer_id;

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2, freelancer_id = NULL, notes = notes || $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(outcome.status())
        .bind(&memo)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let payload = json!({
            "booking_id": id,
            "outcome": outcome.as_str(),
            "reason": reason,
        });
        self.notifier
            .notify(Role::Owner, EventType::BookingCancelled, payload.clone())
            .await;
        self.notifier
            .notify(Role::Customer, EventType::BookingCancelled, payload.clone())
            .await;
        if freed_freelancer.is_some() {
            self.notifier
                .notify(Role::Freelancer, EventType::BookingCancelled, payload)
                .await;
        }

        tracing::info!(
            booking_id = %id,
            outcome = outcome.as_str(),
            minutes_until_start,
            "Booking cancelled"
        );

        Ok(CancellationResult {
            booking: updated,
            cancellation_fee_applied: outcome == CancelOutcome::CancelledWithFee,
            full_refund: outcome == CancelOutcome::CancelledFullRefund,
        })
    }

    /// Update a booking's claim flag or slot. Extending the end time past
    /// the previous end triggers the overrun cascade: every later booking
    /// at the same store and date shifts by the overrun, in start order.
    pub async fn update(&self, id: Uuid, request: &UpdateBookingRequest) -> ApiResult<Booking> {
        let booking = self.get(id).await?;

        if booking.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Booking {} is already {:?}",
                id, booking.status
            )));
        }

        let new_start = match &request.start_time {
            Some(s) => parse_clock(s)?,
            None => booking.start_minutes,
        };
        let new_end = match &request.end_time {
            Some(s) => parse_clock(s)?,
            None => booking.end_minutes,
        };
        if new_end <= new_start {
            return Err(ApiError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }
        let allow_claim = request.allow_claim.unwrap_or(booking.allow_claim);

        let overrun = new_end - booking.end_minutes;

        let mut tx = self.db_pool.begin().await?;

        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET start_minutes = $2, end_minutes = $3, allow_claim = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_start)
        .bind(new_end)
        .bind(allow_claim)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let mut shifted_bookings = Vec::new();

        if overrun > 0 {
            // Later bookings ordered by start so adjacent shifts compose.
            let later: Vec<(Uuid, i32, i32)> = sqlx::query_as(
                r#"
                SELECT id, start_minutes, end_minutes FROM bookings
                WHERE store_id = $1
                  AND date = $2
                  AND id <> $3
                  AND start_minutes >= $4
                  AND status NOT IN ('completed', 'cancelled', 'no_show')
                ORDER BY start_minutes ASC
                "#,
            )
            .bind(booking.store_id)
            .bind(booking.date)
            .bind(id)
            .bind(booking.end_minutes)
            .fetch_all(&mut *tx)
            .await?;

            let shifts = cascade_shifts(overrun, &later);

            // Every shifted slot must still land inside the day; a
            // cascade spilling past midnight rejects the reschedule
            // rather than producing slots the day model cannot hold.
            if let Some(shift) = shifts
                .iter()
                .find(|s| !fits_in_day(s.new_start_minutes, s.new_end_minutes))
            {
                return Err(ApiError::Conflict(format!(
                    "Extending booking {} would push booking {} past midnight",
                    id, shift.booking_id
                )));
            }

            for shift in shifts {
                sqlx::query(
                    "UPDATE bookings SET start_minutes = $2, end_minutes = $3, updated_at = $4 \
                     WHERE id = $1",
                )
                .bind(shift.booking_id)
                .bind(shift.new_start_minutes)
                .bind(shift.new_end_minutes)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

                shifted_bookings.push(shift);
            }
        }

        tx.commit().await?;

        for shift in &shifted_bookings {
            let payload = json!({
                "booking_id": shift.booking_id,
                "shifted_by_minutes": overrun,
                "new_start_minutes": shift.new_start_minutes,
            });
            self.notifier
                .notify(Role::Customer, EventType::BookingRescheduled, payload.clone())
                .await;
            self.notifier
                .notify(
                    Role::Freelancer,
                    EventType::BookingRescheduled,
                    payload.clone(),
                )
                .await;
            self.notifier
                .notify(Role::Owner, EventType::BookingRescheduled, payload)
                .await;
        }

        if overrun > 0 {
            tracing::info!(
                booking_id = %id,
                overrun_minutes = overrun,
                shifted = shifted_bookings.len(),
                "Overrun cascade applied"
            );
        }

        Ok(updated)
    }

    /// Advance a booking to confirmed unless it has already progressed
    /// further. Used by the capture reconciler; safe under re-delivery.
    pub async fn confirm_if_earlier(&self, id: Uuid) -> ApiResult<Booking> {
        let updated = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = 'confirmed', updated_at = $2
            WHERE id = $1 AND status IN ('pending', 'confirmed')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await?;

        match updated {
            Some(b) => Ok(b),
            // Already past confirmed; re-read and leave untouched.
            None => self.get(id).await,
        }
    }
}
