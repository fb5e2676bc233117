//! In-memory stores for tests and database-less deployments.

use async_trait::async_trait;
use chrono::Utc;
use gateway_core::{
    FeatureFlag, GatewayError, KillSwitchStatus, OverrideEntry, OverridePolicy, PolicyAssembler, PolicyStore,
    PolicyWrite, UsageQuery, UsageRecord, UsageSink,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Default)]
struct PolicyTables {
    kill_switch: KillSwitchStatus,
    features: BTreeMap<String, FeatureFlag>,
    overrides: Vec<OverrideEntry>,
}

/// Policy store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    tables: RwLock<PolicyTables>,
    unavailable: AtomicBool,
}

impl InMemoryPolicyStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable.into());
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn load_policy(&self) -> Result<OverridePolicy, GatewayError> {
        self.check()?;
        let tables = self.tables.read();
        let mut assembler = PolicyAssembler::new();
        assembler.kill_switch(tables.kill_switch.enabled);
        for flag in tables.features.values() {
            assembler.feature(&flag.feature, flag.enabled);
        }
        for entry in &tables.overrides {
            assembler.entry(entry);
        }
        Ok(assembler.build())
    }

    async fn write_policy_field(&self, write: PolicyWrite) -> Result<(), GatewayError> {
        self.check()?;
        let now = Utc::now();
        let mut tables = self.tables.write();
        match write {
            PolicyWrite::KillSwitch {
                enabled,
                reason,
                actor,
            } => {
                tables.kill_switch.enabled = enabled;
                if enabled {
                    tables.kill_switch.reason = reason;
                    tables.kill_switch.activated_by = Some(actor);
                    tables.kill_switch.activated_at = Some(now);
                } else {
                    tables.kill_switch.reason = None;
                }
            }
            PolicyWrite::Feature {
                feature,
                enabled,
                description,
                actor,
            } => {
                let flag = tables
                    .features
                    .entry(feature.clone())
                    .or_insert_with(|| FeatureFlag {
                        feature,
                        enabled,
                        description: None,
                        updated_by: None,
                        created_at: now,
                        updated_at: now,
                    });
                flag.enabled = enabled;
                if description.is_some() {
                    flag.description = description;
                }
                flag.updated_by = Some(actor);
                flag.updated_at = now;
            }
            PolicyWrite::Override {
                kind,
                key,
                value,
                actor,
            } => {
                if let Some(entry) = tables
                    .overrides
                    .iter_mut()
                    .find(|e| e.kind == kind && e.key == key)
                {
                    entry.value = value;
                    entry.enabled = true;
                    entry.created_by = Some(actor);
                    entry.updated_at = now;
                } else {
                    tables.overrides.push(OverrideEntry {
                        id: Uuid::new_v4().to_string(),
                        kind,
                        key,
                        value,
                        enabled: true,
                        created_by: Some(actor),
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
        }
        Ok(())
    }

    async fn list_overrides(&self) -> Result<Vec<OverrideEntry>, GatewayError> {
        self.check()?;
        let mut entries: Vec<_> = self
            .tables
            .read()
            .overrides
            .iter()
            .filter(|e| e.enabled)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }

    async fn remove_override(&self, id: &str) -> Result<(), GatewayError> {
        self.check()?;
        let mut tables = self.tables.write();
        let entry = tables
            .overrides
            .iter_mut()
            .find(|e| e.id == id && e.enabled)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        entry.enabled = false;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn kill_switch_status(&self) -> Result<KillSwitchStatus, GatewayError> {
        self.check()?;
        Ok(self.tables.read().kill_switch.clone())
    }

    async fn list_features(&self) -> Result<Vec<FeatureFlag>, GatewayError> {
        self.check()?;
        Ok(self.tables.read().features.values().cloned().collect())
    }
}

/// Usage sink held in process memory
#[derive(Debug, Default)]
pub struct InMemoryUsageSink {
    records: RwLock<Vec<UsageRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryUsageSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every append fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Copy of every stored record, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.read().clone()
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing was stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl UsageSink for InMemoryUsageSink {
    async fn append_usage_record(&self, record: &UsageRecord) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable.into());
        }
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn query_usage(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>, GatewayError> {
        let mut matching: Vec<_> = self
            .records
            .read()
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}
