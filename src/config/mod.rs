//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `MEMBER_GATE` prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use member_gate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod database;
mod error;
mod payment;
mod reconciler;
mod server;
mod telegram;
mod video;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use reconciler::ReconcilerConfig;
pub use server::{Environment, ServerConfig};
pub use telegram::TelegramConfig;
pub use video::VideoConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection; in-memory stores when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Payment configuration (Stripe)
    pub payment: PaymentConfig,

    /// Telegram bot and members group
    pub telegram: TelegramConfig,

    /// DRM video provider
    pub video: VideoConfig,

    /// Timeouts and webhook retention
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `MEMBER_GATE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `MEMBER_GATE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `MEMBER_GATE__PAYMENT__STRIPE_API_KEY=...` -> `payment.stripe_api_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBER_GATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        self.payment.validate()?;
        self.telegram.validate()?;
        self.video.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const MINIMAL_ENV: &[(&str, &str)] = &[
        ("MEMBER_GATE__PAYMENT__STRIPE_API_KEY", "sk_test_xxx"),
        ("MEMBER_GATE__PAYMENT__STRIPE_WEBHOOK_SECRET", "whsec_xxx"),
        ("MEMBER_GATE__PAYMENT__STRIPE_PRICE_ID", "price_xxx"),
        ("MEMBER_GATE__PAYMENT__SUCCESS_URL", "https://t.me/member_gate_bot"),
        ("MEMBER_GATE__PAYMENT__CANCEL_URL", "https://t.me/member_gate_bot"),
        ("MEMBER_GATE__PAYMENT__PORTAL_RETURN_URL", "https://t.me/member_gate_bot"),
        ("MEMBER_GATE__TELEGRAM__BOT_TOKEN", "123456:ABC-DEF"),
        ("MEMBER_GATE__TELEGRAM__GROUP_CHAT_ID", "-1001234567890"),
        ("MEMBER_GATE__VIDEO__API_SECRET", "vdo_secret"),
    ];

    const OPTIONAL_ENV: &[&str] = &[
        "MEMBER_GATE__SERVER__PORT",
        "MEMBER_GATE__SERVER__ENVIRONMENT",
        "MEMBER_GATE__DATABASE__URL",
        "MEMBER_GATE__RECONCILER__WEBHOOK_RETENTION_DAYS",
    ];

    /// Helper to set environment variables for testing
    fn set_minimal_env() {
        for (key, value) in MINIMAL_ENV {
            env::set_var(key, value);
        }
    }

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for (key, _) in MINIMAL_ENV {
            env::remove_var(key);
        }
        for key in OPTIONAL_ENV {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.payment.stripe_price_id, "price_xxx");
        assert_eq!(config.telegram.group_chat_id, -1001234567890);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_section_is_optional() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("MEMBER_GATE__DATABASE__URL", "postgresql://gate@localhost/member_gate");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        let database = config.database.expect("database section");
        assert_eq!(database.url, "postgresql://gate@localhost/member_gate");
        assert!(database.run_migrations);
    }

    #[test]
    fn test_server_and_reconciler_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.reconciler.webhook_retention_days, 30);
        assert_eq!(config.video.api_base_url, "https://dev.vdocipher.com/api");
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("MEMBER_GATE__SERVER__PORT", "3000");
        env::set_var("MEMBER_GATE__SERVER__ENVIRONMENT", "production");
        env::set_var("MEMBER_GATE__RECONCILER__WEBHOOK_RETENTION_DAYS", "7");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.reconciler.webhook_retention_days, 7);
    }

    #[test]
    fn test_missing_payment_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("MEMBER_GATE__TELEGRAM__BOT_TOKEN", "123456:ABC-DEF");
        let result = AppConfig::load();
        clear_env();
        env::remove_var("MEMBER_GATE__TELEGRAM__BOT_TOKEN");

        assert!(result.is_err());
    }
}
