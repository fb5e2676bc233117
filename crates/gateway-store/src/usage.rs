//! SQL-backed usage sink.

use crate::codec::{count, flag, parse_timestamp, timestamp};
use crate::error::{Result, StoreError};
use crate::pool::DatabasePool;
use async_trait::async_trait;
use gateway_core::{ErrorKind, GatewayError, UsageQuery, UsageRecord, UsageSink};
use sqlx::any::AnyRow;
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

const TABLE: &str = "ai_usage_logs";

/// Usage sink over `ai_usage_logs`
#[derive(Debug, Clone)]
pub struct SqlUsageSink {
    pool: Arc<DatabasePool>,
}

impl SqlUsageSink {
    /// Create a sink over a pool whose schema is already bootstrapped
    #[must_use]
    pub const fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: &UsageRecord) -> Result<()> {
        sqlx::query(
            r"INSERT INTO ai_usage_logs
                (id, feature, user_id, provider, model, tier, input_tokens, output_tokens,
                 estimated_cost, duration_ms, success, error_kind, error_message, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(record.id.to_string())
        .bind(&record.feature)
        .bind(record.user_id.clone())
        .bind(record.provider.map(|p| p.as_str().to_string()))
        .bind(record.model.clone())
        .bind(record.tier.map(|t| t.as_str().to_string()))
        .bind(i64::from(record.input_tokens))
        .bind(i64::from(record.output_tokens))
        .bind(record.estimated_cost)
        .bind(i64::try_from(record.duration_ms).unwrap_or(i64::MAX))
        .bind(flag(record.success))
        .bind(record.error_kind.map(|k| k.as_str().to_string()))
        .bind(record.error_message.clone())
        .bind(timestamp(record.timestamp))
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    async fn select(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>> {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut filter = |column: &str, op: &str, value: String| {
            params.push(value);
            clauses.push(format!("{column} {op} ${}", params.len()));
        };

        if let Some(feature) = &query.feature {
            filter("feature", "=", feature.clone());
        }
        if let Some(user_id) = &query.user_id {
            filter("user_id", "=", user_id.clone());
        }
        if let Some(model) = &query.model {
            filter("model", "=", model.clone());
        }
        if let Some(provider) = query.provider {
            filter("provider", "=", provider.as_str().to_string());
        }
        if let Some(start) = query.start {
            filter("created_at", ">=", timestamp(start));
        }
        if let Some(end) = query.end {
            filter("created_at", "<=", timestamp(end));
        }
        if let Some(kind) = query.error_kind {
            filter("error_kind", "=", kind.as_str().to_string());
        }
        if let Some(success) = query.success {
            clauses.push(format!("success = {}", flag(success)));
        }

        let mut sql = String::from(
            "SELECT id, feature, user_id, provider, model, tier, input_tokens, output_tokens, \
             estimated_cost, duration_ms, success, error_kind, error_message, created_at \
             FROM ai_usage_logs",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = statement.bind(param);
        }
        let rows = statement.fetch_all(self.pool.inner()).await?;
        rows.iter().map(decode_record).collect()
    }
}

fn decode_record(row: &AnyRow) -> Result<UsageRecord> {
    let id: String = row.try_get("id")?;
    let provider: Option<String> = row.try_get("provider")?;
    let tier: Option<String> = row.try_get("tier")?;
    let error_kind: Option<String> = row.try_get("error_kind")?;
    let success: i64 = row.try_get("success")?;
    let duration_ms: i64 = row.try_get("duration_ms")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(UsageRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::invalid_row(TABLE, e.to_string()))?,
        feature: row.try_get("feature")?,
        user_id: row.try_get("user_id")?,
        provider: provider
            .map(|p| p.parse())
            .transpose()
            .map_err(|e: GatewayError| StoreError::invalid_row(TABLE, e.to_string()))?,
        model: row.try_get("model")?,
        tier: tier
            .map(|t| t.parse())
            .transpose()
            .map_err(|e: GatewayError| StoreError::invalid_row(TABLE, e.to_string()))?,
        input_tokens: count(TABLE, row.try_get("input_tokens")?)?,
        output_tokens: count(TABLE, row.try_get("output_tokens")?)?,
        estimated_cost: row.try_get("estimated_cost")?,
        duration_ms: u64::try_from(duration_ms).unwrap_or_default(),
        success: success != 0,
        error_kind: error_kind.as_deref().and_then(ErrorKind::parse),
        error_message: row.try_get("error_message")?,
        timestamp: parse_timestamp(TABLE, &created_at)?,
    })
}

#[async_trait]
impl UsageSink for SqlUsageSink {
    async fn append_usage_record(&self, record: &UsageRecord) -> std::result::Result<(), GatewayError> {
        Ok(self.insert(record).await?)
    }

    async fn query_usage(&self, query: &UsageQuery) -> std::result::Result<Vec<UsageRecord>, GatewayError> {
        Ok(self.select(query).await?)
    }
}
