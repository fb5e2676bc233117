//! Usage aggregation.
//!
//! [`UsageSummary`] folds usage records into totals and per-dimension cost
//! breakdowns. [`cost_history`] splits records into calendar buckets.
//! [`UsageLedger`] keeps a running summary for the life of the process, fed
//! by the usage writer task.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use gateway_core::UsageRecord;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated usage statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Total requests
    pub total_requests: u64,
    /// Successful requests
    pub successful_requests: u64,
    /// Total estimated cost (USD)
    pub total_cost: f64,
    /// Total input tokens
    pub total_input_tokens: u64,
    /// Total output tokens
    pub total_output_tokens: u64,
    /// Share of successful requests (0.0 - 1.0)
    pub success_rate: f64,
    /// Mean invocation duration
    pub average_duration_ms: f64,
    /// Cost per feature
    pub cost_by_feature: BTreeMap<String, f64>,
    /// Cost per model
    pub cost_by_model: BTreeMap<String, f64>,
    /// Cost per provider
    pub cost_by_provider: BTreeMap<String, f64>,
    /// Requests per feature
    pub requests_by_feature: BTreeMap<String, u64>,
    /// Earliest record
    pub period_start: Option<DateTime<Utc>>,
    /// Latest record
    pub period_end: Option<DateTime<Utc>>,
}

impl UsageSummary {
    /// Summarize a set of records
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add_record(record);
        }
        summary
    }

    /// Fold one record in
    #[allow(clippy::cast_precision_loss)]
    pub fn add_record(&mut self, record: &UsageRecord) {
        self.total_requests += 1;
        if record.success {
            self.successful_requests += 1;
        }
        self.total_cost += record.estimated_cost;
        self.total_input_tokens += u64::from(record.input_tokens);
        self.total_output_tokens += u64::from(record.output_tokens);

        let total = self.total_requests as f64;
        self.average_duration_ms =
            (self.average_duration_ms * (total - 1.0) + record.duration_ms as f64) / total;
        self.success_rate = self.successful_requests as f64 / total;

        *self.cost_by_feature.entry(record.feature.clone()).or_default() += record.estimated_cost;
        *self.requests_by_feature.entry(record.feature.clone()).or_default() += 1;
        if let Some(model) = &record.model {
            *self.cost_by_model.entry(model.clone()).or_default() += record.estimated_cost;
        }
        if let Some(provider) = record.provider {
            *self
                .cost_by_provider
                .entry(provider.as_str().to_string())
                .or_default() += record.estimated_cost;
        }

        if self.period_start.map_or(true, |start| record.timestamp < start) {
            self.period_start = Some(record.timestamp);
        }
        if self.period_end.map_or(true, |end| record.timestamp > end) {
            self.period_end = Some(record.timestamp);
        }
    }

    /// Merge two summaries
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn merge(mut self, other: &Self) -> Self {
        let before = self.total_requests;
        self.total_requests += other.total_requests;
        self.successful_requests += other.successful_requests;
        self.total_cost += other.total_cost;
        self.total_input_tokens += other.total_input_tokens;
        self.total_output_tokens += other.total_output_tokens;

        if self.total_requests > 0 {
            let total = self.total_requests as f64;
            self.average_duration_ms = (self.average_duration_ms * before as f64
                + other.average_duration_ms * other.total_requests as f64)
                / total;
            self.success_rate = self.successful_requests as f64 / total;
        }

        for (key, cost) in &other.cost_by_feature {
            *self.cost_by_feature.entry(key.clone()).or_default() += cost;
        }
        for (key, cost) in &other.cost_by_model {
            *self.cost_by_model.entry(key.clone()).or_default() += cost;
        }
        for (key, cost) in &other.cost_by_provider {
            *self.cost_by_provider.entry(key.clone()).or_default() += cost;
        }
        for (key, count) in &other.requests_by_feature {
            *self.requests_by_feature.entry(key.clone()).or_default() += count;
        }

        self.period_start = match (self.period_start, other.period_start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.period_end = match (self.period_end, other.period_end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        self
    }
}

/// Width of a cost history bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostPeriod {
    /// Clock hours
    Hourly,
    /// UTC days
    #[default]
    Daily,
    /// ISO weeks starting Monday
    Weekly,
    /// Calendar months
    Monthly,
}

impl CostPeriod {
    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Start of the bucket containing `at`
    #[must_use]
    pub fn bucket_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let day = at.date_naive();
        let start = match self {
            Self::Hourly => day.and_hms_opt(at.hour(), 0, 0),
            Self::Daily => day.and_hms_opt(0, 0, 0),
            Self::Weekly => {
                let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
                monday.and_hms_opt(0, 0, 0)
            }
            Self::Monthly => day.with_day(1).and_then(|first| first.and_hms_opt(0, 0, 0)),
        };
        start.map_or(at, |naive| Utc.from_utc_datetime(&naive))
    }

    /// Start of the bucket after the one beginning at `start`
    #[must_use]
    pub fn bucket_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Hourly => start + Duration::hours(1),
            Self::Daily => start + Duration::days(1),
            Self::Weekly => start + Duration::weeks(1),
            Self::Monthly => {
                let (year, month) = if start.month() == 12 {
                    (start.year() + 1, 1)
                } else {
                    (start.year(), start.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .and_then(|first| first.and_hms_opt(0, 0, 0))
                    .map_or(start + Duration::days(31), |naive| Utc.from_utc_datetime(&naive))
            }
        }
    }
}

impl std::fmt::Display for CostPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spend within one period bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBucket {
    /// Inclusive bucket start
    pub period_start: DateTime<Utc>,
    /// Exclusive bucket end
    pub period_end: DateTime<Utc>,
    /// Requests in the bucket
    pub total_requests: u64,
    /// Successful requests in the bucket
    pub successful_requests: u64,
    /// Estimated cost (USD)
    pub total_cost: f64,
    /// Input tokens
    pub total_input_tokens: u64,
    /// Output tokens
    pub total_output_tokens: u64,
}

/// Split records into period buckets, oldest first.
///
/// Periods without records are left out.
#[must_use]
pub fn cost_history<'a>(
    records: impl IntoIterator<Item = &'a UsageRecord>,
    period: CostPeriod,
) -> Vec<CostBucket> {
    let mut buckets: BTreeMap<DateTime<Utc>, CostBucket> = BTreeMap::new();
    for record in records {
        let start = period.bucket_start(record.timestamp);
        let bucket = buckets.entry(start).or_insert_with(|| CostBucket {
            period_start: start,
            period_end: period.bucket_end(start),
            total_requests: 0,
            successful_requests: 0,
            total_cost: 0.0,
            total_input_tokens: 0,
            total_output_tokens: 0,
        });
        bucket.total_requests += 1;
        if record.success {
            bucket.successful_requests += 1;
        }
        bucket.total_cost += record.estimated_cost;
        bucket.total_input_tokens += u64::from(record.input_tokens);
        bucket.total_output_tokens += u64::from(record.output_tokens);
    }
    buckets.into_values().collect()
}

/// Running usage totals since process start
#[derive(Debug, Default)]
pub struct UsageLedger {
    summary: RwLock<UsageSummary>,
}

impl UsageLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record in
    pub fn record(&self, record: &UsageRecord) {
        self.summary.write().add_record(record);
    }

    /// Copy of the running summary
    #[must_use]
    pub fn summary(&self) -> UsageSummary {
        self.summary.read().clone()
    }

    /// Total estimated cost so far
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.summary.read().total_cost
    }

    /// Start over
    pub fn reset(&self) {
        *self.summary.write() = UsageSummary::default();
    }
}
