//! Usage accounting records.

use crate::error::{ErrorKind, GatewayError};
use crate::types::{ProviderKind, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Immutable accounting entry, one per gateway invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Record id
    pub id: Uuid,
    /// Calling feature
    pub feature: String,
    /// End user on whose behalf the call ran
    pub user_id: Option<String>,
    /// Provider used, absent when no decision was reached
    pub provider: Option<ProviderKind>,
    /// Model used, absent when no decision was reached
    pub model: Option<String>,
    /// Effective tier, absent when it could not be resolved
    pub tier: Option<Tier>,
    /// Prompt tokens
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    /// Wall time of the invocation
    pub duration_ms: u64,
    /// Whether the invocation returned a result
    pub success: bool,
    /// Failure category
    pub error_kind: Option<ErrorKind>,
    /// Failure message
    pub error_message: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// Start a record for a feature
    pub fn builder(feature: impl Into<String>) -> UsageRecordBuilder {
        UsageRecordBuilder::new(feature)
    }

    /// Total tokens
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// Builder for [`UsageRecord`]
#[derive(Debug, Clone)]
pub struct UsageRecordBuilder {
    record: UsageRecord,
}

impl UsageRecordBuilder {
    fn new(feature: impl Into<String>) -> Self {
        Self {
            record: UsageRecord {
                id: Uuid::new_v4(),
                feature: feature.into(),
                user_id: None,
                provider: None,
                model: None,
                tier: None,
                input_tokens: 0,
                output_tokens: 0,
                estimated_cost: 0.0,
                duration_ms: 0,
                success: false,
                error_kind: None,
                error_message: None,
                timestamp: Utc::now(),
            },
        }
    }

    /// Set the user
    #[must_use]
    pub fn user(mut self, user_id: Option<String>) -> Self {
        self.record.user_id = user_id;
        self
    }

    /// Set the tier
    #[must_use]
    pub fn tier(mut self, tier: Option<Tier>) -> Self {
        self.record.tier = tier;
        self
    }

    /// Set provider and model
    #[must_use]
    pub fn target(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.record.provider = Some(provider);
        self.record.model = Some(model.into());
        self
    }

    /// Set token counts and cost
    #[must_use]
    pub fn tokens(mut self, input_tokens: u32, output_tokens: u32, estimated_cost: f64) -> Self {
        self.record.input_tokens = input_tokens;
        self.record.output_tokens = output_tokens;
        self.record.estimated_cost = estimated_cost;
        self
    }

    /// Set elapsed time
    #[must_use]
    pub fn duration(mut self, elapsed: Duration) -> Self {
        self.record.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Finish as a success
    #[must_use]
    pub fn succeeded(mut self) -> UsageRecord {
        self.record.success = true;
        self.record.error_kind = None;
        self.record.error_message = None;
        self.record
    }

    /// Finish as a call abandoned by its caller
    #[must_use]
    pub fn cancelled(mut self) -> UsageRecord {
        self.record.success = false;
        self.record.error_kind = Some(ErrorKind::Cancelled);
        self.record.error_message = Some("invocation cancelled before completion".to_string());
        self.record
    }

    /// Finish as a failure
    #[must_use]
    pub fn failed(mut self, error: &GatewayError) -> UsageRecord {
        self.record.success = false;
        self.record.error_kind = Some(error.kind());
        self.record.error_message = Some(error.to_string());
        self.record
    }
}

/// Filter for usage log queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageQuery {
    /// Only this feature
    #[serde(default)]
    pub feature: Option<String>,
    /// Only this user
    #[serde(default)]
    pub user_id: Option<String>,
    /// Only this model
    #[serde(default)]
    pub model: Option<String>,
    /// Only this provider
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// Inclusive lower bound
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Only successes or only failures
    #[serde(default)]
    pub success: Option<bool>,
    /// Only this failure category
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    /// Maximum rows, newest first
    #[serde(default)]
    pub limit: Option<usize>,
}

impl UsageQuery {
    /// Whether a record passes every filter except `limit`
    #[must_use]
    pub fn matches(&self, record: &UsageRecord) -> bool {
        self.feature.as_ref().map_or(true, |f| *f == record.feature)
            && self
                .user_id
                .as_ref()
                .map_or(true, |u| record.user_id.as_ref() == Some(u))
            && self
                .model
                .as_ref()
                .map_or(true, |m| record.model.as_ref() == Some(m))
            && self.provider.map_or(true, |p| record.provider == Some(p))
            && self.start.map_or(true, |s| record.timestamp >= s)
            && self.end.map_or(true, |e| record.timestamp <= e)
            && self.success.map_or(true, |s| record.success == s)
            && self
                .error_kind
                .map_or(true, |k| record.error_kind == Some(k))
    }

    /// Failures only, as listed by the error log
    #[must_use]
    pub fn failures(mut self) -> Self {
        self.success = Some(false);
        self
    }
}
