//! Persistence boundaries consumed by the gateway.

use crate::error::GatewayError;
use crate::policy::{FeatureFlag, KillSwitchStatus, OverrideEntry, OverridePolicy, PolicyWrite};
use crate::usage::{UsageQuery, UsageRecord};
use async_trait::async_trait;

/// Store of record for the override policy.
///
/// The in-memory policy held by the gateway is a cache of this store; every
/// admin mutation is written here first.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Load the full policy from enabled rows
    async fn load_policy(&self) -> Result<OverridePolicy, GatewayError>;

    /// Persist one mutation
    async fn write_policy_field(&self, write: PolicyWrite) -> Result<(), GatewayError>;

    /// List enabled override rows, newest first
    async fn list_overrides(&self) -> Result<Vec<OverrideEntry>, GatewayError>;

    /// Disable an override row by id
    async fn remove_override(&self, id: &str) -> Result<(), GatewayError>;

    /// Current kill switch row
    async fn kill_switch_status(&self) -> Result<KillSwitchStatus, GatewayError>;

    /// Every feature flag row, ordered by feature name
    async fn list_features(&self) -> Result<Vec<FeatureFlag>, GatewayError>;
}

/// Append-only sink for usage records
#[async_trait]
pub trait UsageSink: Send + Sync {
    /// Append one record
    async fn append_usage_record(&self, record: &UsageRecord) -> Result<(), GatewayError>;

    /// Query stored records, newest first
    async fn query_usage(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>, GatewayError>;
}
