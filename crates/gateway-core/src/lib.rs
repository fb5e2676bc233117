//! # Gateway Core
//!
//! Core types, traits, and error handling for the AI Request Gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Tiers, purposes and the closed provider set
//! - The override policy snapshot and its persisted rows
//! - The uniform provider boundary
//! - Usage records and the persistence traits
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod policy;
pub mod provider;
pub mod store;
pub mod types;
pub mod usage;

// Re-export commonly used types
pub use error::{ErrorKind, GatewayError, GatewayResult};
pub use policy::{
    parse_routing_order, FeatureFlag, KillSwitchStatus, OverrideEntry, OverrideKind, OverridePolicy,
    PolicyAssembler, PolicyWrite, ROUTING_KEY,
};
pub use provider::{
    Content, GenerateOutput, GenerateRequest, ModelProvider, OutputFormat, ProviderStream,
    StreamEvent,
};
pub use store::{PolicyStore, UsageSink};
pub use types::{BlockReason, ProviderKind, Purpose, Tier};
pub use usage::{UsageQuery, UsageRecord, UsageRecordBuilder};
