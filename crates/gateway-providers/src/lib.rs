//! # Gateway Providers
//!
//! Provider clients for the AI Request Gateway.
//!
//! This crate provides:
//! - [`ProviderRegistry`]: the closed provider set mapped to client handles
//! - [`HttpProvider`]: a client speaking the gateway's uniform JSON shape to a
//!   provider sidecar (OpenAI, Anthropic, or the unified upstream gateway)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod registry;

// Re-export main types
pub use http::{HttpProvider, HttpProviderConfig, DEFAULT_HTTP_TIMEOUT};
pub use registry::ProviderRegistry;
