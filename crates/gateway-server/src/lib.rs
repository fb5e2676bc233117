//! # Gateway Server
//!
//! HTTP surface for the AI Request Gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server with graceful shutdown
//! - The invocation endpoint used by internal features
//! - Admin endpoints for the kill switch, feature flags and overrides
//! - Usage, cost and catalog reporting
//! - Health and Prometheus metrics endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod health;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export main types
pub use error::ApiError;
pub use extractors::{AdminUser, JsonBody, RequestId, ADMIN_USER_HEADER};
pub use health::{HealthResponse, HealthStatus, ProviderHealth};
pub use routes::create_router;
pub use server::{Server, ServerConfig, ServerError};
pub use shutdown::shutdown_signal;
pub use state::{AppState, AppStateBuilder, StateError};
