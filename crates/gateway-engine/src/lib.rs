//! # Gateway Engine
//!
//! The invocation entry point and policy administration of the AI Request
//! Gateway.
//!
//! - [`Gateway`]: resolves, dispatches and accounts for every feature call
//! - [`PolicyAdmin`]: write-through admin operations that refresh the live
//!   policy snapshot

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod gateway;
pub mod invocation;

// Re-export main types
pub use admin::PolicyAdmin;
pub use gateway::{BatchConfig, Gateway};
pub use invocation::{
    estimate_tokens, EmbeddingBatch, Invocation, InvocationRequest, InvocationStream, Payload,
    StreamChunk, StreamSummary,
};
