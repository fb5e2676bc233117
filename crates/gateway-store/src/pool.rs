//! Database connection pool management.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::{any::AnyPoolOptions, AnyPool};
use std::time::Duration;
use tracing::info;

/// Database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// PostgreSQL database.
    PostgreSQL,
    /// SQLite database.
    SQLite,
}

impl DatabaseType {
    /// Parse from a database URL.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "postgresql"),
            Self::SQLite => write!(f, "sqlite"),
        }
    }
}

/// Pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of connections.
    pub max_connections: u32,
    /// Minimum number of connections.
    pub min_connections: u32,
    /// Connection timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Idle timeout for connections.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Maximum lifetime for a connection.
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl PoolConfig {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Builder for pool configuration.
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set maximum connections.
    #[must_use]
    pub const fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set minimum connections.
    #[must_use]
    pub const fn min_connections(mut self, min: u32) -> Self {
        self.config.min_connections = min;
        self
    }

    /// Set connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

/// Database connection pool.
pub struct DatabasePool {
    pool: AnyPool,
    database_type: DatabaseType,
    max_connections: u32,
}

impl DatabasePool {
    /// Connect to a database.
    ///
    /// An in-memory SQLite database lives only as long as its connection, so
    /// such URLs get a single connection that is never recycled.
    ///
    /// # Errors
    /// Returns error for unsupported URLs or connection failures
    pub async fn connect(database_url: &str, config: &PoolConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let database_type = DatabaseType::from_url(database_url)
            .ok_or_else(|| StoreError::UnsupportedDatabase(database_url.to_string()))?;

        let in_memory = database_type == DatabaseType::SQLite && database_url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { config.max_connections };

        let mut options = AnyPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(config.min_connections.min(max_connections))
            .acquire_timeout(config.connect_timeout);
        options = if in_memory {
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options
                .idle_timeout(Some(config.idle_timeout))
                .max_lifetime(Some(config.max_lifetime))
        };

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(database = %database_type, max_connections, "Connected to policy database");

        Ok(Self {
            pool,
            database_type,
            max_connections,
        })
    }

    /// Connect to a private in-memory SQLite database.
    ///
    /// # Errors
    /// Returns error if the SQLite driver cannot open the database
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:", &PoolConfig::default()).await
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn inner(&self) -> &AnyPool {
        &self.pool
    }

    /// Get the database type.
    #[must_use]
    pub const fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.max_connections,
        }
    }
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabasePool")
            .field("database_type", &self.database_type)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Current number of connections.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum connections allowed.
    pub max_connections: u32,
}
