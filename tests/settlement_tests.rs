//! Escrow settlement and webhook reconciliation integration tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use sqlx::PgPool;
    use uuid::Uuid;

    use bookveil_server::assignment::AssignmentService;
    use bookveil_server::availability::AvailabilityIndex;
    use bookveil_server::booking::BookingService;
    use bookveil_server::catalog::CatalogService;
    use bookveil_server::commission::CommissionService;
    use bookveil_server::error::ApiError;
    use bookveil_server::escrow::model::{CreateIntentRequest, PayoutPayee};
    use bookveil_server::escrow::EscrowService;
    use bookveil_server::gateway::StubGateway;
    use bookveil_server::notifier::{EventType, RecordingNotifier};
    use bookveil_server::ranking::RankWeights;
    use bookveil_server::webhook::service::CaptureOutcome;
    use bookveil_server::webhook::ReconcilerService;

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
        booking_id: Uuid,
        freelancer_id: Uuid,
    }

    /// Store + service + a pending booking, optionally pre-staffed.
    async fn seed_booking(pool: &PgPool, staffed: bool) -> Seed {
        let store_id = Uuid::new_v4();
        let service_id = Uuid::new_v4();
        let freelancer_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 9, 20).expect("valid date");

        sqlx::query(
            "INSERT INTO stores (id, name, auto_assign_enabled) VALUES ($1, 'Settle Salon', FALSE)",
        )
        .bind(store_id)
        .execute(pool)
        .await
        .expect("insert store");

        sqlx::query(
            "INSERT INTO services (id, store_id, name, duration_minutes, home_allowed, price) \
             VALUES ($1, $2, 'Facial', 45, TRUE, 120000)",
        )
        .bind(service_id)
        .bind(store_id)
        .execute(pool)
        .await
        .expect("insert service");

        sqlx::query(
            "INSERT INTO freelancers (id, name, rating, active) VALUES ($1, 'Meera', 4.8, TRUE)",
        )
        .bind(freelancer_id)
        .execute(pool)
        .await
        .expect("insert freelancer");

        sqlx::query(
            "INSERT INTO bookings (id, store_id, service_id, user_id, date, start_minutes, \
             end_minutes, location_type, status, freelancer_id) \
             VALUES ($1, $2, $3, $4, $5, 600, 645, 'home', 'pending', $6)",
        )
        .bind(booking_id)
        .bind(store_id)
        .bind(service_id)
        .bind(Uuid::new_v4())
        .bind(date)
        .bind(staffed.then_some(freelancer_id))
        .execute(pool)
        .await
        .expect("insert booking");

        Seed {
            booking_id,
            freelancer_id,
        }
    }

    fn escrow_service(pool: &PgPool) -> EscrowService {
        EscrowService::new(
            pool.clone(),
            CommissionService::new(pool.clone()),
            Arc::new(StubGateway),
        )
    }

    fn intent_request(booking_id: Uuid) -> CreateIntentRequest {
        CreateIntentRequest {
            booking_id,
            amount: 1000,
            tax: 180,
            currency: "INR".to_string(),
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_release_creates_default_split_payouts() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, true).await;
        let service = escrow_service(&pool);

        let intent = service
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        let payouts = service.release(intent.payment.id).await.expect("release");

        // Default split 80/10/10 over the base amount, tax excluded.
        assert_eq!(payouts.len(), 3);
        let share = |payee: PayoutPayee| {
            payouts
                .iter()
                .find(|p| p.payee == payee)
                .map(|p| p.amount)
                .expect("payout present")
        };
        assert_eq!(share(PayoutPayee::Store), 800);
        assert_eq!(share(PayoutPayee::Freelancer), 100);
        assert_eq!(share(PayoutPayee::Platform), 100);

        let freelancer_payout = payouts
            .iter()
            .find(|p| p.payee == PayoutPayee::Freelancer)
            .expect("freelancer payout");
        assert_eq!(freelancer_payout.payee_id, Some(seed.freelancer_id));
        assert_eq!(
            payouts.iter().map(|p| p.amount).sum::<i64>(),
            intent.payment.amount
        );
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_release_is_single_shot() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, true).await;
        let service = escrow_service(&pool);

        let intent = service
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        service.release(intent.payment.id).await.expect("release");

        let again = service.release(intent.payment.id).await;
        assert!(
            matches!(again, Err(ApiError::Conflict(_))),
            "second release must conflict, got {:?}",
            again
        );

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM payouts p \
             JOIN escrows e ON e.id = p.escrow_id WHERE e.payment_id = $1",
        )
        .bind(intent.payment.id)
        .fetch_one(&pool)
        .await
        .expect("count payouts");
        assert_eq!(count, 3, "double release must not double-pay");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_unstaffed_release_folds_freelancer_share_into_platform() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, false).await;
        let service = escrow_service(&pool);

        let intent = service
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        let payouts = service.release(intent.payment.id).await.expect("release");

        assert_eq!(payouts.len(), 2);
        assert!(payouts.iter().all(|p| p.payee != PayoutPayee::Freelancer));
        let platform = payouts
            .iter()
            .find(|p| p.payee == PayoutPayee::Platform)
            .expect("platform payout");
        assert_eq!(platform.amount, 200);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_release_pays_freelancer_assigned_after_intent() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, false).await;
        let service = escrow_service(&pool);

        // Prepaid flow: the intent exists before anyone is matched.
        let intent = service
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        // Matching lands after capture.
        sqlx::query("UPDATE bookings SET status = 'assigned', freelancer_id = $2 WHERE id = $1")
            .bind(seed.booking_id)
            .bind(seed.freelancer_id)
            .execute(&pool)
            .await
            .expect("assign freelancer");

        let payouts = service.release(intent.payment.id).await.expect("release");

        // The split follows the booking at release time, not the empty
        // snapshot the intent was created with.
        assert_eq!(payouts.len(), 3);
        let freelancer_payout = payouts
            .iter()
            .find(|p| p.payee == PayoutPayee::Freelancer)
            .expect("freelancer payout");
        assert_eq!(freelancer_payout.payee_id, Some(seed.freelancer_id));
        assert_eq!(freelancer_payout.amount, 100);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_refund_flips_status_once() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, true).await;
        let service = escrow_service(&pool);

        let intent = service
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        let refund = service
            .refund(intent.payment.id, 1180, Some("no show"))
            .await
            .expect("refund");
        assert!(refund.gateway_refund_ref.is_some());

        let payment = service
            .get_payment(intent.payment.id)
            .await
            .expect("read payment");
        assert_eq!(
            payment.status,
            bookveil_server::escrow::model::PaymentStatus::Refunded
        );

        let again = service.refund(intent.payment.id, 1180, None).await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_refunds_have_one_winner() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, true).await;
        let service = escrow_service(&pool);

        let intent = service
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        let a = {
            let svc = service.clone();
            let id = intent.payment.id;
            tokio::spawn(async move { svc.refund(id, 1180, Some("duplicate request")).await })
        };
        let b = {
            let svc = service.clone();
            let id = intent.payment.id;
            tokio::spawn(async move { svc.refund(id, 1180, Some("duplicate request")).await })
        };

        let results = [a.await.expect("join"), b.await.expect("join")];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one refund must win, got {:?}", results);
        let loser = results
            .iter()
            .find(|r| r.is_err())
            .expect("one refund must lose");
        assert!(matches!(loser, Err(ApiError::Conflict(_))));

        // Only the winner reached the gateway and recorded a row.
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refunds WHERE payment_id = $1")
            .bind(intent.payment.id)
            .fetch_one(&pool)
            .await
            .expect("count refunds");
        assert_eq!(count, 1, "double refund must not record twice");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_duplicate_capture_delivery_is_idempotent() {
        let pool = setup_test_db().await;
        let seed = seed_booking(&pool, false).await;
        let escrow = escrow_service(&pool);

        let notifier = Arc::new(RecordingNotifier::default());
        let catalog = CatalogService::new(pool.clone());
        let booking = BookingService::new(pool.clone(), catalog.clone(), notifier.clone(), 15, 30);
        let assignment = AssignmentService::new(
            pool.clone(),
            AvailabilityIndex::new(pool.clone()),
            catalog,
            notifier.clone(),
            RankWeights::default(),
        );
        let reconciler =
            ReconcilerService::new(escrow.clone(), booking, assignment, notifier.clone());

        let intent = escrow
            .create_intent(&intent_request(seed.booking_id))
            .await
            .expect("create intent");

        let first = reconciler
            .on_captured("stub", &intent.gateway_order_id)
            .await
            .expect("first delivery");
        assert_eq!(first, CaptureOutcome::Applied);

        let second = reconciler
            .on_captured("stub", &intent.gateway_order_id)
            .await
            .expect("second delivery");
        assert_eq!(second, CaptureOutcome::AlreadyCaptured);

        // Side effects ran exactly once: the store has no linked roster, so
        // the booking parks as unassigned and the owner hears about it once.
        let (status,): (String,) =
            sqlx::query_as("SELECT status::TEXT FROM bookings WHERE id = $1")
                .bind(seed.booking_id)
                .fetch_one(&pool)
                .await
                .expect("read booking");
        assert_eq!(status, "unassigned");
        assert_eq!(notifier.count_of(EventType::PaymentCaptured), 1);
        assert_eq!(notifier.count_of(EventType::NoFreelancers), 1);
    }
}
