pub mod admin;
pub mod payments;
pub mod webhooks;

use crate::config::AppConfig;
use crate::health::HealthChecker;
use crate::payments::client::InvoiceProvider;
use std::sync::Arc;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: sqlx::PgPool,
    pub provider: Arc<dyn InvoiceProvider>,
    pub config: Arc<AppConfig>,
    pub health_checker: HealthChecker,
}
