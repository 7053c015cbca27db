//! Error types for the durable registry.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid row data: {field}, reason: {reason}")]
    InvalidRow { field: String, reason: String },
}

impl StoreError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::Connection(_) | Self::Migration(_) => Level::ERROR,
            Self::Query(_) => Level::ERROR,
            Self::Serialization(_) | Self::InvalidRow { .. } => Level::WARN,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
