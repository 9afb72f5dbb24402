//! Error types for the churnfeat-core crate.

use thiserror::Error;

/// Top-level error type for feature pipeline runs.
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Data error: customer {customer_id}, field {field}: {message}")]
    Data {
        customer_id: String,
        field: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ChurnError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn data(customer_id: &str, field: &'static str, msg: impl Into<String>) -> Self {
        Self::Data {
            customer_id: customer_id.to_string(),
            field,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<figment::Error> for ChurnError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
