//! BookVeil API server
//!
//! Booking, assignment and escrow settlement APIs for a salon
//! marketplace, backed by Postgres and a payment gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bookveil_server::assignment::AssignmentService;
use bookveil_server::availability::AvailabilityIndex;
use bookveil_server::booking::BookingService;
use bookveil_server::catalog::CatalogService;
use bookveil_server::commission::CommissionService;
use bookveil_server::config::Config;
use bookveil_server::db;
use bookveil_server::escrow::EscrowService;
use bookveil_server::gateway::{PaymentGateway, RazorpayGateway};
use bookveil_server::handlers::health_check;
use bookveil_server::notifier::{LogNotifier, Notifier};
use bookveil_server::ranking::RankWeights;
use bookveil_server::routes;
use bookveil_server::state::AppState;
use bookveil_server::webhook::ReconcilerService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(environment = ?config.environment, "Starting bookveil-server");

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(
        config.gateway_base_url.clone(),
        config.gateway_key_id.clone(),
        config.gateway_key_secret.clone(),
    ));
    let gateway_name = gateway.name();

    let catalog = CatalogService::new(db_pool.clone());
    let availability = AvailabilityIndex::new(db_pool.clone());
    let commission = CommissionService::new(db_pool.clone());
    let rank_weights = RankWeights::default();

    let booking_service = BookingService::new(
        db_pool.clone(),
        catalog.clone(),
        notifier.clone(),
        config.booking_buffer_minutes,
        config.cancellation_fee_window_minutes,
    );
    let assignment_service = AssignmentService::new(
        db_pool.clone(),
        availability.clone(),
        catalog.clone(),
        notifier.clone(),
        rank_weights,
    );
    let escrow_service = EscrowService::new(db_pool.clone(), commission, gateway);
    let reconciler = ReconcilerService::new(
        escrow_service.clone(),
        booking_service.clone(),
        assignment_service.clone(),
        notifier.clone(),
    );

    let app_state = AppState {
        booking_service: Arc::new(booking_service),
        assignment_service: Arc::new(assignment_service),
        availability_index: Arc::new(availability),
        escrow_service: Arc::new(escrow_service),
        reconciler: Arc::new(reconciler),
        rank_weights,
        gateway_name,
        webhook_secret: Some(config.webhook_secret.clone()).filter(|s| !s.is_empty()),
    };

    let health_db_pool = db_pool.clone();

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(move || health_check(health_db_pool.clone())))
        .merge(routes::booking_routes())
        .merge(routes::assignment_routes())
        .merge(routes::availability_routes())
        .merge(routes::payment_routes())
        .merge(routes::webhook_routes())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "BookVeil API Server"
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let Some(allowed_origins) = allowed_origins.filter(|s| !s.is_empty()) else {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
