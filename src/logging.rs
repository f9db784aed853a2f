//! Tracing initialization
//! Log level comes from `RUST_LOG` or `LOG_LEVEL`, output format from `LOG_FORMAT`.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level.to_lowercase())
    });

    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "plain".to_string());

    if format == "json" {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}
