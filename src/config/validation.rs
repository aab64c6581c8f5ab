//! Configuration validation module

use crate::config::{DatabaseConfig, IngestionConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Database configuration error: {message}")]
    Database { message: String },

    #[error("Ingestion configuration error: {message}")]
    Ingestion { message: String },
}

impl ValidationError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn ingestion(message: impl Into<String>) -> Self {
        Self::Ingestion {
            message: message.into(),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::database("Database URL cannot be empty"));
        }

        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::database(
                "Database URL must start with postgres:// or postgresql://",
            ));
        }

        if self.max_connections == 0 {
            return Err(ValidationError::database(
                "Max connections must be greater than 0",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ValidationError::database(
                "Min connections cannot exceed max connections",
            ));
        }

        Ok(())
    }
}

impl Validate for IngestionConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_rows == 0 {
            return Err(ValidationError::ingestion(
                "max_rows must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_validation() {
        let valid = DatabaseConfig {
            url: "postgres://localhost/hakon".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 10,
        };
        assert!(valid.validate().is_ok());

        // Empty URL
        let invalid = DatabaseConfig {
            url: String::new(),
            ..valid.clone()
        };
        assert!(invalid.validate().is_err());

        // Wrong scheme
        let invalid = DatabaseConfig {
            url: "mysql://localhost/hakon".to_string(),
            ..valid.clone()
        };
        assert!(invalid.validate().is_err());

        // Zero pool size
        let invalid = DatabaseConfig {
            max_connections: 0,
            ..valid
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_ingestion_config_validation() {
        let valid = IngestionConfig {
            strict: false,
            max_rows: 50_000,
        };
        assert!(valid.validate().is_ok());

        let invalid = IngestionConfig {
            max_rows: 0,
            ..valid
        };
        assert!(invalid.validate().is_err());
    }
}
