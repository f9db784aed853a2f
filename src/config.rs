//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use bigdecimal::BigDecimal;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub invoicing: InvoicingConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Hostel payment policy: a single configured amount owed per resident.
/// The charge amount is never caller-supplied.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub amount_owed: BigDecimal,
    pub currency: String,
    pub due_days: i64,
}

/// Invoicing provider configuration
#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub callback_url: String,
    pub return_url: String,
}

impl InvoicingConfig {
    /// Secret used to verify inbound webhook signatures. Falls back to the
    /// API secret key when no dedicated webhook secret is configured.
    pub fn webhook_signing_secret(&self) -> &str {
        self.webhook_secret.as_deref().unwrap_or(&self.secret_key)
    }
}

/// Administrative API tokens. Each token resolves to a caller subject and a
/// role so every back-office mutation carries an accountable identity.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub tokens: Vec<AdminToken>,
}

#[derive(Debug, Clone)]
pub struct AdminToken {
    pub token: String,
    pub subject: String,
    pub role: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            payment: PaymentConfig::from_env()?,
            invoicing: InvoicingConfig::from_env()?,
            admin: AdminConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.invoicing.validate()?;
        self.admin.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("PORT cannot be 0".to_string()));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("HOST cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl PaymentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let amount_raw = env::var("PAYMENT_AMOUNT_OWED")
            .map_err(|_| ConfigError::MissingVariable("PAYMENT_AMOUNT_OWED".to_string()))?;
        let amount_owed = BigDecimal::from_str(amount_raw.trim())
            .map_err(|_| ConfigError::InvalidValue("PAYMENT_AMOUNT_OWED".to_string()))?;

        Ok(PaymentConfig {
            amount_owed,
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "NGN".to_string()),
            due_days: env::var("PAYMENT_DUE_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PAYMENT_DUE_DAYS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.amount_owed <= BigDecimal::from(0) {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_AMOUNT_OWED must be greater than 0".to_string(),
            ));
        }

        if self.currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue("PAYMENT_CURRENCY".to_string()));
        }

        if self.due_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "PAYMENT_DUE_DAYS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(InvoicingConfig {
            base_url: env::var("INVOICE_API_BASE_URL")
                .map_err(|_| ConfigError::MissingVariable("INVOICE_API_BASE_URL".to_string()))?,
            secret_key: env::var("INVOICE_API_SECRET_KEY")
                .map_err(|_| ConfigError::MissingVariable("INVOICE_API_SECRET_KEY".to_string()))?,
            webhook_secret: env::var("INVOICE_WEBHOOK_SECRET").ok(),
            timeout_secs: env::var("INVOICE_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("INVOICE_API_TIMEOUT_SECS".to_string()))?,
            max_retries: env::var("INVOICE_API_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("INVOICE_API_MAX_RETRIES".to_string()))?,
            callback_url: env::var("PAYMENT_CALLBACK_URL")
                .map_err(|_| ConfigError::MissingVariable("PAYMENT_CALLBACK_URL".to_string()))?,
            return_url: env::var("PAYMENT_RETURN_URL")
                .map_err(|_| ConfigError::MissingVariable("PAYMENT_RETURN_URL".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "INVOICE_API_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "INVOICE_API_SECRET_KEY".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "INVOICE_API_TIMEOUT_SECS".to_string(),
            ));
        }

        if self.callback_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("PAYMENT_CALLBACK_URL".to_string()));
        }

        if self.return_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("PAYMENT_RETURN_URL".to_string()));
        }

        Ok(())
    }
}

impl AdminConfig {
    /// Parses `ADMIN_API_TOKENS=token:subject:role,token:subject:role,...`
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env::var("ADMIN_API_TOKENS")
            .map_err(|_| ConfigError::MissingVariable("ADMIN_API_TOKENS".to_string()))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut tokens = Vec::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let mut parts = entry.splitn(3, ':');
            let token = parts.next().unwrap_or("").trim();
            let subject = parts.next().unwrap_or("").trim();
            let role = parts.next().unwrap_or("admin").trim();
            if token.is_empty() || subject.is_empty() {
                return Err(ConfigError::InvalidValue("ADMIN_API_TOKENS".to_string()));
            }
            tokens.push(AdminToken {
                token: token.to_string(),
                subject: subject.to_string(),
                role: role.to_string(),
            });
        }

        Ok(AdminConfig { tokens })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ADMIN_API_TOKENS must configure at least one token".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Invalid port
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_payment_amount_must_be_positive() {
        let config = PaymentConfig {
            amount_owed: BigDecimal::from(0),
            currency: "NGN".to_string(),
            due_days: 14,
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admin_token_parsing() {
        let config = AdminConfig::parse("tok_1:bursar@hostel:admin, tok_2:warden@hostel:viewer")
            .expect("token list should parse");
        assert_eq!(config.tokens.len(), 2);
        assert_eq!(config.tokens[0].subject, "bursar@hostel");
        assert_eq!(config.tokens[1].role, "viewer");
    }

    #[test]
    fn test_admin_tokens_required() {
        let config = AdminConfig { tokens: vec![] };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_webhook_secret_falls_back_to_api_key() {
        let config = InvoicingConfig {
            base_url: "https://invoices.example.com".to_string(),
            secret_key: "sk_test".to_string(),
            webhook_secret: None,
            timeout_secs: 15,
            max_retries: 3,
            callback_url: "https://hostel.example.com/webhooks/payments".to_string(),
            return_url: "https://hostel.example.com/payments/complete".to_string(),
        };

        assert_eq!(config.webhook_signing_secret(), "sk_test");
    }
}
