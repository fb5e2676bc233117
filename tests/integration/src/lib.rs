//! Integration tests for the AI Request Gateway
//!
//! This crate wires the gateway the way the binary does, over in-memory
//! SQLite and wiremock provider sidecars, and covers:
//! - Routing decisions and policy blocks
//! - Retries, deadlines and usage recording
//! - The invoke and admin HTTP surfaces

pub mod fixtures;
pub mod helpers;
pub mod mock_providers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_providers::*;

#[cfg(test)]
mod admin_api_tests;
#[cfg(test)]
mod e2e_tests;
