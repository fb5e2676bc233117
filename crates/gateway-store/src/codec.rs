//! Column encodings shared by the SQL stores.

use crate::error::{Result, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-width UTC text so lexical order matches time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::invalid_row(table, format!("timestamp {value:?}: {e}")))
}

pub(crate) const fn flag(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn count(table: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::invalid_row(table, format!("count out of range: {value}")))
}
