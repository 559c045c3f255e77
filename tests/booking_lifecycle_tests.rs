//! Booking lifecycle integration tests against a real Postgres database

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use sqlx::PgPool;
    use uuid::Uuid;

    use bookveil_server::assignment::AssignmentService;
    use bookveil_server::availability::AvailabilityIndex;
    use bookveil_server::booking::model::{
        CancelBookingRequest, CreateBookingRequest, LocationType, UpdateBookingRequest,
    };
    use bookveil_server::booking::BookingService;
    use bookveil_server::catalog::CatalogService;
    use bookveil_server::error::ApiError;
    use bookveil_server::notifier::{EventType, RecordingNotifier};
    use bookveil_server::ranking::RankWeights;

    /// Helper to create a test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/bookveil_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    struct Seed {
        store_id: Uuid,
        service_id: Uuid,
        freelancer_id: Uuid,
        date: NaiveDate,
    }

    /// Fresh store + service + one linked freelancer with a wide-open day.
    async fn seed_catalog(pool: &PgPool) -> Seed {
        let store_id = Uuid::new_v4();
        let service_id = Uuid::new_v4();
        let freelancer_id = Uuid::new_v4();
        // Far enough out that the cancellation policy sees a full refund.
        let date = chrono::Utc::now().date_naive() + chrono::Duration::days(30);

        sqlx::query(
            "INSERT INTO stores (id, name, latitude, longitude, auto_assign_enabled) \
             VALUES ($1, 'Test Salon', 12.9716, 77.5946, FALSE)",
        )
        .bind(store_id)
        .execute(pool)
        .await
        .expect("insert store");

        sqlx::query(
            "INSERT INTO services (id, store_id, name, duration_minutes, home_allowed, radius_km, price) \
             VALUES ($1, $2, 'Haircut', 30, TRUE, 10.0, 50000)",
        )
        .bind(service_id)
        .bind(store_id)
        .execute(pool)
        .await
        .expect("insert service");

        sqlx::query(
            "INSERT INTO freelancers (id, name, latitude, longitude, rating, active) \
             VALUES ($1, 'Asha', 12.9720, 77.5950, 4.5, TRUE)",
        )
        .bind(freelancer_id)
        .execute(pool)
        .await
        .expect("insert freelancer");

        sqlx::query("INSERT INTO freelancer_stores (freelancer_id, store_id) VALUES ($1, $2)")
            .bind(freelancer_id)
            .bind(store_id)
            .execute(pool)
            .await
            .expect("link freelancer");

        sqlx::query(
            "INSERT INTO availability_windows (id, freelancer_id, date, start_minutes, end_minutes) \
             VALUES ($1, $2, $3, 540, 1080)",
        )
        .bind(Uuid::new_v4())
        .bind(freelancer_id)
        .bind(date)
        .execute(pool)
        .await
        .expect("insert availability");

        Seed {
            store_id,
            service_id,
            freelancer_id,
            date,
        }
    }

    fn booking_service(pool: &PgPool) -> (BookingService, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = BookingService::new(
            pool.clone(),
            CatalogService::new(pool.clone()),
            notifier.clone(),
            15,
            30,
        );
        (service, notifier)
    }

    fn create_request(seed: &Seed, start: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id: Uuid::new_v4(),
            store_id: seed.store_id,
            service_id: seed.service_id,
            date: seed.date,
            start_time: start.to_string(),
            end_time: None,
            location_type: LocationType::Home,
            notes: None,
            booking_id: None,
            auto_assign: false,
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_create_rejects_slot_within_buffer() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, _) = booking_service(&pool);

        // 10:00-10:30, 30-minute duration from the service row.
        service
            .create(&create_request(&seed, "10:00"))
            .await
            .expect("first booking should succeed");

        // 10:40 start is inside the 15-minute buffer around 10:00-10:30.
        let conflict = service.create(&create_request(&seed, "10:40")).await;
        assert!(
            matches!(conflict, Err(ApiError::Conflict(_))),
            "booking inside buffer should conflict, got {:?}",
            conflict
        );

        // 10:46 clears the buffer.
        service
            .create(&create_request(&seed, "10:46"))
            .await
            .expect("booking past buffer should succeed");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_create_with_same_id_is_idempotent() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, _) = booking_service(&pool);

        let mut request = create_request(&seed, "12:00");
        request.booking_id = Some(Uuid::new_v4());

        let first = service.create(&request).await.expect("first create");
        let second = service.create(&request).await.expect("retried create");

        assert_eq!(first.id, second.id);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE id = $1")
            .bind(first.id)
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1, "retry must not create a second row");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_claims_have_one_winner() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (booking_svc, _) = booking_service(&pool);

        // Second freelancer to race against the seeded one.
        let rival_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO freelancers (id, name, rating, active) VALUES ($1, 'Rival', 4.0, TRUE)",
        )
        .bind(rival_id)
        .execute(&pool)
        .await
        .expect("insert rival");

        let booking = booking_svc
            .create(&create_request(&seed, "14:00"))
            .await
            .expect("create booking");
        booking_svc
            .update(
                booking.id,
                &UpdateBookingRequest {
                    allow_claim: Some(true),
                    start_time: None,
                    end_time: None,
                },
            )
            .await
            .expect("open for claims");

        let notifier = Arc::new(RecordingNotifier::default());
        let assignment = AssignmentService::new(
            pool.clone(),
            AvailabilityIndex::new(pool.clone()),
            CatalogService::new(pool.clone()),
            notifier,
            RankWeights::default(),
        );

        let a = {
            let svc = assignment.clone();
            let id = booking.id;
            let freelancer = seed.freelancer_id;
            tokio::spawn(async move { svc.claim(id, freelancer).await })
        };
        let b = {
            let svc = assignment.clone();
            let id = booking.id;
            tokio::spawn(async move { svc.claim(id, rival_id).await })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one claim must win, got {:?}", results);

        let loser = results
            .iter()
            .find(|r| r.is_err())
            .expect("one claim must lose");
        assert!(matches!(loser, Err(ApiError::Conflict(_))));

        let (assigned,): (Option<Uuid>,) =
            sqlx::query_as("SELECT freelancer_id FROM bookings WHERE id = $1")
                .bind(booking.id)
                .fetch_one(&pool)
                .await
                .expect("read booking");
        assert!(assigned.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancel_far_future_refunds_in_full() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, notifier) = booking_service(&pool);

        let booking = service
            .create(&create_request(&seed, "15:00"))
            .await
            .expect("create booking");

        let result = service
            .cancel(
                booking.id,
                &CancelBookingRequest {
                    reason: Some("plans changed".to_string()),
                },
            )
            .await
            .expect("cancel");

        assert!(result.full_refund);
        assert!(!result.cancellation_fee_applied);
        assert!(notifier.count_of(EventType::BookingCancelled) >= 2);

        // A second cancel hits the terminal guard.
        let again = service
            .cancel(booking.id, &CancelBookingRequest::default())
            .await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_rejected_booking_can_be_cancelled() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, _) = booking_service(&pool);

        let booking = service
            .create(&create_request(&seed, "09:00"))
            .await
            .expect("create booking");

        // Every offered freelancer turned the job down.
        sqlx::query("UPDATE bookings SET status = 'rejected' WHERE id = $1")
            .bind(booking.id)
            .execute(&pool)
            .await
            .expect("mark rejected");

        // Rejection is not terminal: the customer can still walk away.
        let result = service
            .cancel(booking.id, &CancelBookingRequest::default())
            .await
            .expect("cancel rejected booking");
        assert!(result.full_refund);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_rejected_booking_still_holds_its_slot() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, _) = booking_service(&pool);

        let booking = service
            .create(&create_request(&seed, "16:00"))
            .await
            .expect("create booking");

        sqlx::query("UPDATE bookings SET status = 'rejected' WHERE id = $1")
            .bind(booking.id)
            .execute(&pool)
            .await
            .expect("mark rejected");

        // The slot stays blocked until the booking is actually cancelled;
        // a rejected booking is still waiting for a new freelancer.
        let overlap = service.create(&create_request(&seed, "16:05")).await;
        assert!(
            matches!(overlap, Err(ApiError::Conflict(_))),
            "rejected booking must still block its slot, got {:?}",
            overlap
        );
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_cancels_have_one_winner() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, notifier) = booking_service(&pool);

        let booking = service
            .create(&create_request(&seed, "13:00"))
            .await
            .expect("create booking");

        let a = {
            let svc = service.clone();
            let id = booking.id;
            tokio::spawn(async move { svc.cancel(id, &CancelBookingRequest::default()).await })
        };
        let b = {
            let svc = service.clone();
            let id = booking.id;
            tokio::spawn(async move { svc.cancel(id, &CancelBookingRequest::default()).await })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one cancel must win, got {:?}", results);
        let loser = results
            .iter()
            .find(|r| r.is_err())
            .expect("one cancel must lose");
        assert!(matches!(loser, Err(ApiError::Conflict(_))));

        // The losing cancel must not append a second memo.
        let (notes,): (String,) = sqlx::query_as("SELECT notes FROM bookings WHERE id = $1")
            .bind(booking.id)
            .fetch_one(&pool)
            .await
            .expect("read notes");
        assert_eq!(notes.matches("[cancelled").count(), 1);

        // Owner + customer notified once, not twice.
        assert_eq!(notifier.count_of(EventType::BookingCancelled), 2);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cascade_past_midnight_rejects_the_extension() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, notifier) = booking_service(&pool);

        let a = service
            .create(&create_request(&seed, "22:30"))
            .await
            .expect("booking A");
        let b = service
            .create(&create_request(&seed, "23:16"))
            .await
            .expect("booking B");

        // Extending A to 23:30 would push B to 23:46-00:16 of the next
        // day, which the same-day slot model cannot represent.
        let result = service
            .update(
                a.id,
                &UpdateBookingRequest {
                    allow_claim: None,
                    start_time: None,
                    end_time: Some("23:30".to_string()),
                },
            )
            .await;
        assert!(
            matches!(result, Err(ApiError::Conflict(_))),
            "cascade past midnight must be rejected, got {:?}",
            result
        );

        // The whole reschedule rolled back: A and B keep their slots.
        let (a_end,): (i32,) =
            sqlx::query_as("SELECT end_minutes FROM bookings WHERE id = $1")
                .bind(a.id)
                .fetch_one(&pool)
                .await
                .expect("read A");
        assert_eq!(a_end, 1380);

        let b_row: (i32, i32) = sqlx::query_as(
            "SELECT start_minutes, end_minutes FROM bookings WHERE id = $1",
        )
        .bind(b.id)
        .fetch_one(&pool)
        .await
        .expect("read B");
        assert_eq!(b_row, (1396, 1426));

        assert_eq!(notifier.count_of(EventType::BookingRescheduled), 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_overrun_cascade_shifts_later_bookings() {
        let pool = setup_test_db().await;
        let seed = seed_catalog(&pool).await;
        let (service, notifier) = booking_service(&pool);

        let a = service
            .create(&create_request(&seed, "10:00"))
            .await
            .expect("booking A");
        let b = service
            .create(&create_request(&seed, "10:46"))
            .await
            .expect("booking B");
        let c = service
            .create(&create_request(&seed, "11:32"))
            .await
            .expect("booking C");

        // A runs 30 minutes over: 10:30 -> 11:00.
        service
            .update(
                a.id,
                &UpdateBookingRequest {
                    allow_claim: None,
                    start_time: None,
                    end_time: Some("11:00".to_string()),
                },
            )
            .await
            .expect("extend A");

        let read = |id: Uuid| {
            let pool = pool.clone();
            async move {
                sqlx::query_as::<_, (i32, i32)>(
                    "SELECT start_minutes, end_minutes FROM bookings WHERE id = $1",
                )
                .bind(id)
                .fetch_one(&pool)
                .await
                .expect("read booking")
            }
        };

        // B: 10:46-11:16 -> 11:16-11:46; C: 11:32-12:02 -> 12:02-12:32.
        assert_eq!(read(b.id).await, (676, 706));
        assert_eq!(read(c.id).await, (722, 752));

        // Three roles notified per shifted booking.
        assert_eq!(notifier.count_of(EventType::BookingRescheduled), 6);
    }
}
