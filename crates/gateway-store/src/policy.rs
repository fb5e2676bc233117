//! SQL-backed policy store.

use crate::codec::{flag, parse_timestamp, timestamp};
use crate::error::{Result, StoreError};
use crate::pool::DatabasePool;
use async_trait::async_trait;
use chrono::Utc;
use gateway_core::{
    FeatureFlag, GatewayError, KillSwitchStatus, OverrideEntry, OverrideKind, OverridePolicy, PolicyAssembler,
    PolicyStore, PolicyWrite,
};
use sqlx::any::AnyRow;
use sqlx::Row;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const KILL_SWITCH_ID: &str = "global";

/// Policy store over `ai_overrides`, `ai_feature_flags` and `ai_kill_switch`
#[derive(Debug, Clone)]
pub struct SqlPolicyStore {
    pool: Arc<DatabasePool>,
}

impl SqlPolicyStore {
    /// Create a store over a pool whose schema is already bootstrapped
    #[must_use]
    pub const fn new(pool: Arc<DatabasePool>) -> Self {
        Self { pool }
    }

    async fn load(&self) -> Result<OverridePolicy> {
        let mut assembler = PolicyAssembler::new();

        let kill_switch = self.kill_switch().await?;
        assembler.kill_switch(kill_switch.enabled);

        let flags = sqlx::query("SELECT feature_name, enabled FROM ai_feature_flags")
            .fetch_all(self.pool.inner())
            .await?;
        for row in &flags {
            let feature: String = row.try_get("feature_name")?;
            let enabled: i64 = row.try_get("enabled")?;
            assembler.feature(&feature, enabled != 0);
        }

        for entry in self.overrides().await? {
            assembler.entry(&entry);
        }

        Ok(assembler.build())
    }

    async fn write(&self, write: PolicyWrite) -> Result<()> {
        let now = timestamp(Utc::now());
        match write {
            PolicyWrite::KillSwitch {
                enabled,
                reason,
                actor,
            } => {
                let (activated_by, activated_at) = if enabled {
                    (Some(actor.clone()), Some(now.clone()))
                } else {
                    (None, None)
                };
                sqlx::query(
                    r"INSERT INTO ai_kill_switch (id, enabled, reason, activated_by, activated_at, updated_at)
                      VALUES ($1, $2, $3, $4, $5, $6)
                      ON CONFLICT (id) DO UPDATE SET
                        enabled = excluded.enabled,
                        reason = excluded.reason,
                        activated_by = COALESCE(excluded.activated_by, ai_kill_switch.activated_by),
                        activated_at = COALESCE(excluded.activated_at, ai_kill_switch.activated_at),
                        updated_at = excluded.updated_at",
                )
                .bind(KILL_SWITCH_ID)
                .bind(flag(enabled))
                .bind(if enabled { reason.clone() } else { None })
                .bind(activated_by)
                .bind(activated_at)
                .bind(&now)
                .execute(self.pool.inner())
                .await?;

                if enabled {
                    warn!(reason = ?reason, by = %actor, "AI kill switch activated");
                } else {
                    info!(by = %actor, "AI kill switch deactivated");
                }
            }
            PolicyWrite::Feature {
                feature,
                enabled,
                description,
                actor,
            } => {
                sqlx::query(
                    r"INSERT INTO ai_feature_flags (feature_name, enabled, description, updated_by, created_at, updated_at)
                      VALUES ($1, $2, $3, $4, $5, $6)
                      ON CONFLICT (feature_name) DO UPDATE SET
                        enabled = excluded.enabled,
                        description = COALESCE(excluded.description, ai_feature_flags.description),
                        updated_by = excluded.updated_by,
                        updated_at = excluded.updated_at",
                )
                .bind(&feature)
                .bind(flag(enabled))
                .bind(description)
                .bind(&actor)
                .bind(&now)
                .bind(&now)
                .execute(self.pool.inner())
                .await?;
            }
            PolicyWrite::Override {
                kind,
                key,
                value,
                actor,
            } => {
                sqlx::query(
                    r"INSERT INTO ai_overrides
                        (id, override_type, override_key, override_value, enabled, created_by, created_at, updated_at)
                      VALUES ($1, $2, $3, $4, 1, $5, $6, $7)
                      ON CONFLICT (override_type, override_key) DO UPDATE SET
                        override_value = excluded.override_value,
                        enabled = 1,
                        created_by = excluded.created_by,
                        updated_at = excluded.updated_at",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(kind.as_str())
                .bind(&key)
                .bind(&value)
                .bind(&actor)
                .bind(&now)
                .bind(&now)
                .execute(self.pool.inner())
                .await?;
            }
        }
        Ok(())
    }

    async fn overrides(&self) -> Result<Vec<OverrideEntry>> {
        let rows = sqlx::query(
            r"SELECT id, override_type, override_key, override_value, enabled, created_by, created_at, updated_at
              FROM ai_overrides
              WHERE enabled = 1
              ORDER BY updated_at DESC",
        )
        .fetch_all(self.pool.inner())
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_override(row) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping unreadable override row"),
            }
        }
        Ok(entries)
    }

    async fn features(&self) -> Result<Vec<FeatureFlag>> {
        let rows = sqlx::query(
            r"SELECT feature_name, enabled, description, updated_by, created_at, updated_at
              FROM ai_feature_flags
              ORDER BY feature_name",
        )
        .fetch_all(self.pool.inner())
        .await?;

        let mut flags = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_feature(row) {
                Ok(flag) => flags.push(flag),
                Err(e) => warn!(error = %e, "Skipping unreadable feature flag row"),
            }
        }
        Ok(flags)
    }

    async fn disable_override(&self, id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE ai_overrides SET enabled = 0, updated_at = $1 WHERE id = $2 AND enabled = 1")
            .bind(timestamp(Utc::now()))
            .bind(id)
            .execute(self.pool.inner())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn kill_switch(&self) -> Result<KillSwitchStatus> {
        let row = sqlx::query("SELECT enabled, reason, activated_by, activated_at FROM ai_kill_switch WHERE id = $1")
            .bind(KILL_SWITCH_ID)
            .fetch_optional(self.pool.inner())
            .await?;

        let Some(row) = row else {
            return Ok(KillSwitchStatus::default());
        };
        let enabled: i64 = row.try_get("enabled")?;
        let activated_at: Option<String> = row.try_get("activated_at")?;
        Ok(KillSwitchStatus {
            enabled: enabled != 0,
            reason: row.try_get("reason")?,
            activated_by: row.try_get("activated_by")?,
            activated_at: activated_at
                .map(|at| parse_timestamp("ai_kill_switch", &at))
                .transpose()?,
        })
    }
}

fn decode_override(row: &AnyRow) -> Result<OverrideEntry> {
    let kind: String = row.try_get("override_type")?;
    let kind = kind
        .parse::<OverrideKind>()
        .map_err(|e| StoreError::invalid_row("ai_overrides", e.to_string()))?;
    let enabled: i64 = row.try_get("enabled")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(OverrideEntry {
        id: row.try_get("id")?,
        kind,
        key: row.try_get("override_key")?,
        value: row.try_get("override_value")?,
        enabled: enabled != 0,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp("ai_overrides", &created_at)?,
        updated_at: parse_timestamp("ai_overrides", &updated_at)?,
    })
}

fn decode_feature(row: &AnyRow) -> Result<FeatureFlag> {
    let enabled: i64 = row.try_get("enabled")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(FeatureFlag {
        feature: row.try_get("feature_name")?,
        enabled: enabled != 0,
        description: row.try_get("description")?,
        updated_by: row.try_get("updated_by")?,
        created_at: parse_timestamp("ai_feature_flags", &created_at)?,
        updated_at: parse_timestamp("ai_feature_flags", &updated_at)?,
    })
}

#[async_trait]
impl PolicyStore for SqlPolicyStore {
    async fn load_policy(&self) -> std::result::Result<OverridePolicy, GatewayError> {
        Ok(self.load().await?)
    }

    async fn write_policy_field(&self, write: PolicyWrite) -> std::result::Result<(), GatewayError> {
        Ok(self.write(write).await?)
    }

    async fn list_overrides(&self) -> std::result::Result<Vec<OverrideEntry>, GatewayError> {
        Ok(self.overrides().await?)
    }

    async fn remove_override(&self, id: &str) -> std::result::Result<(), GatewayError> {
        Ok(self.disable_override(id).await?)
    }

    async fn kill_switch_status(&self) -> std::result::Result<KillSwitchStatus, GatewayError> {
        Ok(self.kill_switch().await?)
    }

    async fn list_features(&self) -> std::result::Result<Vec<FeatureFlag>, GatewayError> {
        Ok(self.features().await?)
    }
}
