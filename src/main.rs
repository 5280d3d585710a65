//! Pustaka Server - Library Lending Management System
//!
//! A Rust REST API server for institutional book lending: loan lifecycle,
//! return-proof review and fine settlement.

use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pustaka_server::{api, config::AppConfig, repository::Repository, services::Services, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("pustaka_server={},tower_http=debug", config.logging.level).into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Pustaka Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    // Save server address and media root before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let media_root = config.media.root_dir.clone();

    // Create repository and services
    let repository = Repository::new(pool);
    let services = Services::new(repository, &config).expect("Failed to create services");

    // Background due-date reminder sweep (read-only over loan state)
    services.reminders.clone().spawn();

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    // Build router
    let app = create_router(state, &media_root);

    // Start server
    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState, media_root: &str) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication & profile
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me))
        .route("/auth/profile", put(api::users::update_my_profile))
        .route("/auth/profile/photo", post(api::users::upload_my_photo))
        // Books (catalog)
        .route("/books", get(api::books::list_books))
        .route("/books", post(api::books::create_book))
        .route("/books/:id", get(api::books::get_book))
        .route("/books/:id", put(api::books::update_book))
        .route("/books/:id/cover", post(api::books::upload_cover))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users", post(api::users::create_user))
        .route("/users/:id", get(api::users::get_user))
        .route("/users/:id/summary", get(api::users::user_summary))
        .route("/users/:id/loans", get(api::loans::get_user_loans))
        .route("/users/:id/fines", get(api::loans::get_user_fines))
        .route("/users/:id/payments", get(api::payments::get_user_payments))
        // Loans
        .route("/loans", post(api::loans::create_loan))
        .route("/loans/:id", get(api::loans::get_loan))
        .route("/loans/:id/decision", post(api::loans::decide_loan))
        .route("/loans/:id/pickup", post(api::loans::confirm_pickup))
        .route("/loans/:id/confirm", post(api::loans::confirm_borrow))
        .route("/loans/queue/:status", get(api::loans::loan_queue))
        // Returns
        .route("/loans/:id/return", post(api::returns::submit_return))
        .route("/loans/:id/return/review", post(api::returns::review_return))
        // Payments
        .route("/payments", post(api::payments::initiate_payment))
        .route("/payments/settleable", get(api::payments::settleable_loans))
        .route("/payments/queue/pending", get(api::payments::pending_payments))
        .route("/payments/:id", get(api::payments::get_payment))
        .route("/payments/:id/proof", post(api::payments::upload_proof))
        .route("/payments/:id/verify", post(api::payments::verify_payment))
        .route("/payments/:id/cancel", post(api::payments::cancel_payment))
        // Notifications
        .route("/notifications", get(api::users::list_notifications))
        .route("/notifications/:id/read", post(api::users::mark_notification_read))
        .route(
            "/notifications/subscriptions",
            post(api::users::register_subscription),
        )
        .with_state(state.clone());

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .nest_service("/media", ServeDir::new(media_root))
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
