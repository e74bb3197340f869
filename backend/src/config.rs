//! Configuration management for the Stockroom server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STOCKROOM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Session token configuration
    pub auth: AuthConfig,

    /// CSV import fallbacks
    pub import: ImportConfig,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Apply embedded migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Secret key for signing JWT tokens
    pub jwt_secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,

    /// Name of the session cookie set at login
    pub cookie_name: String,

    /// Mark the session cookie `Secure`
    pub cookie_secure: bool,

    /// Superuser created at startup when none exists
    pub bootstrap_username: String,
    pub bootstrap_email: String,
    pub bootstrap_password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Store used when a CSV row names an unknown store
    pub default_store_name: String,
    pub default_store_code: String,

    /// Category used when a CSV row names an unknown category
    pub default_category_name: String,

    /// `min_stock` of inventory records created by an import
    pub default_min_stock: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKROOM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", true)?
            .set_default("auth.access_token_expiry", 3600)?
            .set_default("auth.refresh_token_expiry", 604800)?
            .set_default("auth.cookie_name", "session")?
            .set_default("auth.cookie_secure", true)?
            .set_default("auth.bootstrap_username", "admin")?
            .set_default("auth.bootstrap_email", "admin@stockroom.local")?
            .set_default("auth.bootstrap_password", "admin123")?
            .set_default("import.default_store_name", "Main Store")?
            .set_default("import.default_store_code", "MAIN")?
            .set_default("import.default_category_name", "General")?
            .set_default("import.default_min_stock", 10)?
            .set_default("logging.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKROOM__ prefix)
            .add_source(
                Environment::with_prefix("STOCKROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
