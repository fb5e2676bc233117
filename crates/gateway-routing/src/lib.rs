//! # Gateway Routing
//!
//! Model selection for the AI Request Gateway.
//!
//! This crate provides:
//! - The static model catalog (tier x provider -> model, pricing, limits)
//! - Purpose profiles with default tier and generation parameters
//! - The override resolver applying kill switch, feature flags, tier pins,
//!   model pins and routing order on top of catalog defaults

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod resolver;

// Re-export main types
pub use catalog::{ModelCatalog, ModelCatalogBuilder, ModelDescriptor, PurposeProfile};
pub use resolver::{Decision, OverrideResolver, Resolution};
