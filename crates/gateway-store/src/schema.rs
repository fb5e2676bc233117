//! Database schema.
//!
//! Column types are restricted to what both SQLite and PostgreSQL accept
//! through the `Any` driver: integers as `BIGINT`, flags as `0/1`, costs as
//! `DOUBLE PRECISION` and timestamps as RFC 3339 text in UTC.

use crate::error::Result;
use crate::pool::DatabasePool;
use tracing::{debug, info};

/// Override rows keyed by `(override_type, override_key)`.
pub const CREATE_OVERRIDES: &str = r"
    CREATE TABLE IF NOT EXISTS ai_overrides (
        id TEXT PRIMARY KEY,
        override_type TEXT NOT NULL,
        override_key TEXT NOT NULL,
        override_value TEXT NOT NULL,
        enabled BIGINT NOT NULL DEFAULT 1,
        created_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (override_type, override_key)
    )
";

/// Per-feature enable flags.
pub const CREATE_FEATURE_FLAGS: &str = r"
    CREATE TABLE IF NOT EXISTS ai_feature_flags (
        feature_name TEXT PRIMARY KEY,
        enabled BIGINT NOT NULL DEFAULT 1,
        description TEXT,
        updated_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

/// The single global kill switch row.
pub const CREATE_KILL_SWITCH: &str = r"
    CREATE TABLE IF NOT EXISTS ai_kill_switch (
        id TEXT PRIMARY KEY,
        enabled BIGINT NOT NULL DEFAULT 0,
        reason TEXT,
        activated_by TEXT,
        activated_at TEXT,
        updated_at TEXT NOT NULL
    )
";

/// Append-only usage log.
pub const CREATE_USAGE_LOGS: &str = r"
    CREATE TABLE IF NOT EXISTS ai_usage_logs (
        id TEXT PRIMARY KEY,
        feature TEXT NOT NULL,
        user_id TEXT,
        provider TEXT,
        model TEXT,
        tier TEXT,
        input_tokens BIGINT NOT NULL DEFAULT 0,
        output_tokens BIGINT NOT NULL DEFAULT 0,
        estimated_cost DOUBLE PRECISION NOT NULL DEFAULT 0,
        duration_ms BIGINT NOT NULL DEFAULT 0,
        success BIGINT NOT NULL,
        error_kind TEXT,
        error_message TEXT,
        created_at TEXT NOT NULL
    )
";

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_ai_usage_logs_created_at ON ai_usage_logs (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_ai_usage_logs_feature ON ai_usage_logs (feature)",
    "CREATE INDEX IF NOT EXISTS idx_ai_usage_logs_user_id ON ai_usage_logs (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_ai_overrides_enabled ON ai_overrides (enabled)",
];

/// Every statement in execution order.
#[must_use]
pub fn all_statements() -> Vec<&'static str> {
    let mut statements = vec![
        CREATE_OVERRIDES,
        CREATE_FEATURE_FLAGS,
        CREATE_KILL_SWITCH,
        CREATE_USAGE_LOGS,
    ];
    statements.extend_from_slice(INDEXES);
    statements
}

/// Create any missing tables and indexes. Safe to run on every start.
///
/// # Errors
/// Returns error if a statement fails
pub async fn bootstrap(pool: &DatabasePool) -> Result<()> {
    for statement in all_statements() {
        debug!(statement = statement.trim(), "Applying schema statement");
        sqlx::query(statement).execute(pool.inner()).await?;
    }
    info!(database = %pool.database_type(), "Schema ready");
    Ok(())
}
