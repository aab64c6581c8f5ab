//! Configuration management

pub mod validation;

pub use validation::{Validate, ValidationError};

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub ingestion: IngestionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/hakon".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Ingestion behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Reject rows with non-canonical severities instead of defaulting to Medium
    pub strict: bool,
    /// Upper bound on CSV rows per upload (scanner exports are human-sized)
    pub max_rows: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_rows: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    ///
    /// Sources in increasing priority: `config/default`, `config/{ENV}`,
    /// `config/local`, then `HAKON__`-prefixed environment variables with `__`
    /// separators. `DATABASE_URL` overrides the database URL if present.
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("HAKON").separator("__"));

        let mut config: Config = builder.build()?.try_deserialize()?;

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            config.database.url = database_url;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.ingestion.validate()?;
        Ok(())
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationError),
}
