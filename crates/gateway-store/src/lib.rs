//! # Gateway Store
//!
//! Persistence for the AI Request Gateway.
//!
//! This crate provides:
//! - A connection pool over SQLite or PostgreSQL
//! - Idempotent schema bootstrap for the policy and usage tables
//! - SQL implementations of the policy store and usage sink
//! - In-memory implementations for tests and database-less runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use gateway_store::{schema, DatabasePool, PoolConfig, SqlPolicyStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = DatabasePool::connect("sqlite://gateway.db", &PoolConfig::default()).await?;
//!     schema::bootstrap(&pool).await?;
//!     let _store = SqlPolicyStore::new(Arc::new(pool));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
pub mod error;
pub mod memory;
pub mod policy;
pub mod pool;
pub mod schema;
pub mod usage;

pub use error::{Result, StoreError};
pub use memory::{InMemoryPolicyStore, InMemoryUsageSink};
pub use policy::SqlPolicyStore;
pub use pool::{DatabasePool, DatabaseType, PoolConfig, PoolConfigBuilder, PoolStats};
pub use usage::SqlUsageSink;
