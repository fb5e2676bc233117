//! Store error types.

use gateway_core::GatewayError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store error type.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// SQL execution error.
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row did not decode into a domain value.
    #[error("Invalid row in {table}: {reason}")]
    InvalidRow {
        /// Source table.
        table: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Override row not found.
    #[error("Override not found: {id}")]
    NotFound {
        /// Requested id.
        id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Pool error.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Timeout error.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Database not supported.
    #[error("Database type not supported: {0}")]
    UnsupportedDatabase(String),

    /// Store deliberately unavailable.
    #[error("Store unavailable")]
    Unavailable,
}

impl StoreError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid row error.
    pub fn invalid_row(table: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRow {
            table,
            reason: reason.into(),
        }
    }

    /// Check if the error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_) | Self::Pool(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(e) => Self::Config(e.to_string()),
            sqlx::Error::Database(e) => Self::Execution(e.to_string()),
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => Self::Timeout("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::ColumnNotFound(column) => Self::invalid_row("unknown", format!("missing column {column}")),
            _ => Self::Execution(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } | StoreError::Config(_) => Self::configuration(err.to_string()),
            _ => Self::store(err.to_string()),
        }
    }
}
