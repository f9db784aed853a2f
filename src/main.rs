use axum::{
    routing::{get, post},
    Json, Router,
};
use dormpay_backend::api::{self, AppState};
use dormpay_backend::config::AppConfig;
use dormpay_backend::health::HealthStatus;
use dormpay_backend::logging::init_tracing;
use dormpay_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use dormpay_backend::payments::client::{InvoiceApiClient, InvoiceProvider};
use dormpay_backend::{database, health};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Starting dormpay backend service"
    );

    let config = AppConfig::from_env().map_err(|e| {
        error!("❌ Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;
    config.validate().map_err(|e| {
        error!("❌ Invalid configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Server configuration loaded"
    );

    info!("📊 Initializing database connection pool...");
    let db_pool = database::init_pool_from_config(&config.database)
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;
    info!("✅ Database connection pool initialized");

    info!("🧾 Initializing invoicing provider client...");
    let provider: Arc<dyn InvoiceProvider> =
        Arc::new(InvoiceApiClient::new(config.invoicing.clone()).map_err(|e| {
            error!("Failed to initialize invoicing client: {}", e);
            anyhow::anyhow!(e)
        })?);
    info!(base_url = %config.invoicing.base_url, "✅ Invoicing provider client initialized");

    let health_checker = health::HealthChecker::new(db_pool.clone());

    let state = AppState {
        db_pool,
        provider,
        config: Arc::new(config.clone()),
        health_checker,
    };

    info!("🛣️  Setting up application routes...");
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_handler))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .route("/api/payments/initiate", post(api::payments::initiate_payment))
        .route("/webhooks/payments", post(api::webhooks::handle_payment_webhook))
        .route("/api/admin/payments/sync", post(api::admin::sync_payment))
        .route(
            "/api/admin/payments/cleanup",
            post(api::admin::cleanup_duplicates),
        )
        .route(
            "/api/admin/payments/override",
            post(api::admin::override_status),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );
    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");

    Ok(())
}

async fn root() -> &'static str {
    "Welcome to the Dormpay Backend API"
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    let health_status = state.health_checker.check_health().await;

    if !health_status.is_healthy() {
        error!("❌ Health check failed - service unhealthy");
        return Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ));
    }

    Ok(Json(health_status))
}

/// Readiness probe - checks if the service is ready to accept traffic
async fn readiness(
    state: axum::extract::State<AppState>,
) -> Result<Json<HealthStatus>, (axum::http::StatusCode, String)> {
    health_handler(state).await
}

/// Liveness probe - checks if the service is alive (basic check)
async fn liveness() -> &'static str {
    "OK"
}
