//! Availability index service - candidate discovery for a booking window

use sqlx::PgPool;
use uuid::Uuid;

use crate::availability::model::{
    Candidate, Coordinate, Distance, FindAvailableQuery, FreelancerRow,
};
use crate::error::{ApiError, ApiResult};

/// Read-side index over the freelancer roster, their declared availability
/// windows, and the booking table.
#[derive(Clone)]
pub struct AvailabilityIndex {
    db_pool: PgPool,
}

impl AvailabilityIndex {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Find freelancers able to take a job in the given window.
    ///
    /// Returns the filtered set un-ranked; ordering is `ranking::rank`'s
    /// job. A store with no linked freelancers yields an empty set (no
    /// global fallback).
    pub async fn find_available(&self, query: &FindAvailableQuery) -> ApiResult<Vec<Candidate>> {
        let roster = self.linked_freelancers(query.store_id).await?;
        if roster.is_empty() {
            return Ok(Vec::new());
        }

        let radius_km = match query.service_id {
            Some(service_id) => self.service_radius(service_id).await?,
            None => None,
        };

        let end_minutes = query.end_minutes();
        let mut candidates = Vec::new();

        for freelancer in roster {
            let distance = self.resolve_distance(&freelancer, query.origin).await;

            if let Some(radius) = radius_km {
                if distance.exceeds_radius(radius) {
                    continue;
                }
            }

            if !self
                .has_containing_window(freelancer.id, query, end_minutes)
                .await?
            {
                continue;
            }

            if self
                .has_conflicting_booking(freelancer.id, query, end_minutes)
                .await?
            {
                continue;
            }

            let load = self.booking_load(freelancer.id, query).await?;

            candidates.push(Candidate {
                freelancer_id: freelancer.id,
                distance,
                rating: freelancer.rating,
                load,
            });
        }

        tracing::debug!(
            store_id = %query.store_id,
            date = %query.date,
            candidates = candidates.len(),
            "Availability lookup complete"
        );

        Ok(candidates)
    }

    /// Active freelancers linked to the store.
    async fn linked_freelancers(&self, store_id: Uuid) -> ApiResult<Vec<FreelancerRow>> {
        let rows = sqlx::query_as::<_, FreelancerRow>(
            r#"
            SELECT f.id, f.latitude, f.longitude, f.rating
            FROM freelancers f
            JOIN freelancer_stores fs ON fs.freelancer_id = f.id
            WHERE fs.store_id = $1 AND f.active = TRUE
            ORDER BY f.id
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows)
    }

    async fn service_radius(&self, service_id: Uuid) -> ApiResult<Option<f64>> {
        let radius: Option<(Option<f64>,)> =
            sqlx::query_as("SELECT radius_km FROM services WHERE id = $1")
                .bind(service_id)
                .fetch_optional(&self.db_pool)
                .await?;

        match radius {
            Some((r,)) => Ok(r),
            None => Err(ApiError::NotFound(format!("Service {} not found", service_id))),
        }
    }

    /// Distance from the request origin to the freelancer, falling back to
    /// the coordinate of their first linked store. Failed lookups degrade
    /// to `Distance::Unknown` rather than failing the whole query.
    async fn resolve_distance(
        &self,
        freelancer: &FreelancerRow,
        origin: Option<Coordinate>,
    ) -> Distance {
        let Some(origin) = origin else {
            return Distance::Unknown;
        };

        if let (Some(lat), Some(lon)) = (freelancer.latitude, freelancer.longitude) {
            return Distance::Known(origin.haversine_km(&Coordinate::new(lat, lon)));
        }

        match self.first_linked_store_coordinate(freelancer.id).await {
            Ok(Some(store_coord)) => Distance::Known(origin.haversine_km(&store_coord)),
            Ok(None) => Distance::Unknown,
            Err(e) => {
                tracing::warn!(
                    freelancer_id = %freelancer.id,
                    error = %e,
                    "Coordinate fallback lookup failed, treating distance as unknown"
                );
                Distance::Unknown
            }
        }
    }

    async fn first_linked_store_coordinate(
        &self,
        freelancer_id: Uuid,
    ) -> ApiResult<Option<Coordinate>> {
        let row: Option<(Option<f64>, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT s.latitude, s.longitude
            FROM stores s
            JOIN freelancer_stores fs ON fs.store_id = s.id
            WHERE fs.freelancer_id = $1
            ORDER BY s.id
            LIMIT 1
            "#,
        )
        .bind(freelancer_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(match row {
            Some((Some(lat), Some(lon))) => Some(Coordinate::new(lat, lon)),
            _ => None,
        })
    }

    /// A declared window must fully contain the request window, not merely
    /// overlap it. Freelancers with no windows on the date fail here.
    async fn has_containing_window(
        &self,
        freelancer_id: Uuid,
        query: &FindAvailableQuery,
        end_minutes: i32,
    ) -> ApiResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM availability_windows
                WHERE freelancer_id = $1
                  AND date = $2
                  AND start_minutes <= $3
                  AND end_minutes >= $4
            )
            "#,
        )
        .bind(freelancer_id)
        .bind(query.date)
        .bind(query.start_minutes)
        .bind(end_minutes)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(exists)
    }

    /// Overlap against bookings the freelancer is actually committed to.
    /// No buffer here: the buffer is a booking-creation concern.
    async fn has_conflicting_booking(
        &self,
        freelancer_id: Uuid,
        query: &FindAvailableQuery,
        end_minutes: i32,
    ) -> ApiResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE freelancer_id = $1
                  AND date = $2
                  AND status IN ('assigned', 'accepted', 'in_progress')
                  AND start_minutes < $4
                  AND end_minutes > $3
            )
            "#,
        )
        .bind(freelancer_id)
        .bind(query.date)
        .bind(query.start_minutes)
        .bind(end_minutes)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(exists)
    }

    async fn booking_load(
        &self,
        freelancer_id: Uuid,
        query: &FindAvailableQuery,
    ) -> ApiResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE freelancer_id = $1 AND date = $2",
        )
        .bind(freelancer_id)
        .bind(query.date)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(count)
    }
}
