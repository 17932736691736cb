use crate::usage::UsageSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAccountRecord {
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<UsageSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CachedAccountRecord {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            snapshot: None,
            source_label: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Persisted document: `{activeIdentity, records}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCacheState {
    #[serde(default)]
    pub active_identity: Option<String>,
    #[serde(default)]
    pub records: Vec<CachedAccountRecord>,
}

/// Display and trim order: the active record first, then newest `updated_at`,
/// then identity ascending.
pub fn compare_records(
    a: &CachedAccountRecord,
    b: &CachedAccountRecord,
    active: Option<&str>,
) -> Ordering {
    let a_active = active.is_some_and(|id| id == a.identity);
    let b_active = active.is_some_and(|id| id == b.identity);
    b_active
        .cmp(&a_active)
        .then_with(|| b.updated_at.cmp(&a.updated_at))
        .then_with(|| a.identity.cmp(&b.identity))
}

/// Sort `records` and keep at most `limit` of them. The active record always survives.
pub fn trim_records(records: &mut Vec<CachedAccountRecord>, active: Option<&str>, limit: usize) {
    records.sort_by(|a, b| compare_records(a, b, active));
    if records.len() <= limit {
        return;
    }

    // Sorting put the active record (if any) at the front, so truncation keeps it
    // as long as there is room for one record.
    let has_active = records
        .first()
        .is_some_and(|r| active.is_some_and(|id| id == r.identity));
    let keep = if has_active { limit.max(1) } else { limit };
    records.truncate(keep);
}
