use super::record::{AccountCacheState, CachedAccountRecord, compare_records, trim_records};
use crate::error::CastorError;
use crate::usage::UsageSnapshot;
use crate::utils::fs::{to_sorted_json, write_atomic};
use ahash::AHashSet;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One row of the account list as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDisplay {
    pub identity: String,
    pub is_active: bool,
    pub snapshot: Option<UsageSnapshot>,
    pub source_label: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// A cached snapshot exists but no live one is available.
    pub is_using_cached_data: bool,
}

/// Persisted account records plus an in-memory map of live snapshots.
///
/// Identities passed in are expected to be normalized already.
pub struct AccountCache {
    path: PathBuf,
    limit: usize,
    state: Mutex<AccountCacheState>,
    live: Cache<String, UsageSnapshot>,
}

impl AccountCache {
    /// Load the cache document at `path`; a missing file starts empty.
    pub async fn load(path: impl Into<PathBuf>, limit: usize, live_ttl: Duration) -> Self {
        let path = path.into();
        let state = match read_state(&path).await {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Account cache unreadable; starting empty");
                AccountCacheState::default()
            }
        };
        debug!(
            path = %path.display(),
            records = state.records.len(),
            active = ?state.active_identity,
            "Account cache loaded"
        );

        Self {
            path,
            limit: limit.max(1),
            state: Mutex::new(state),
            live: Cache::builder()
                .time_to_live(live_ttl.max(Duration::from_secs(1)))
                .max_capacity(1024)
                .build(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop non-active records whose identity is not in `valid_identities`.
    pub async fn prune(&self, valid_identities: &AHashSet<String>) -> Result<(), CastorError> {
        let mut state = self.state.lock().await;
        let active = state.active_identity.clone();
        let before = state.records.len();
        state.records.retain(|r| {
            active.as_deref() == Some(r.identity.as_str()) || valid_identities.contains(&r.identity)
        });

        let dropped = before - state.records.len();
        if dropped > 0 {
            info!(dropped, "Pruned cached accounts without credentials");
            self.persist(&mut state).await?;
        }
        Ok(())
    }

    pub async fn active_identity(&self) -> Option<String> {
        self.state.lock().await.active_identity.clone()
    }

    pub async fn record(&self, identity: &str) -> Option<CachedAccountRecord> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .find(|r| r.identity == identity)
            .cloned()
    }

    /// Store a freshly fetched snapshot and clear any previous error.
    pub async fn record_snapshot(
        &self,
        identity: &str,
        snapshot: UsageSnapshot,
        source_label: &str,
    ) -> Result<(), CastorError> {
        self.mutate(identity, |record| {
            record.snapshot = Some(snapshot);
            record.source_label = Some(source_label.to_string());
            record.last_error = None;
        })
        .await
    }

    /// Record a failed fetch. A previously cached snapshot is kept.
    pub async fn record_error(
        &self,
        identity: &str,
        error: &str,
        source_label: &str,
    ) -> Result<(), CastorError> {
        self.mutate(identity, |record| {
            record.source_label = Some(source_label.to_string());
            record.last_error = Some(error.to_string());
        })
        .await
    }

    /// Create the record if needed and bump its timestamp.
    pub async fn touch(&self, identity: &str) -> Result<(), CastorError> {
        self.mutate(identity, |_| {}).await
    }

    pub async fn set_active(&self, identity: &str) -> Result<(), CastorError> {
        let mut state = self.state.lock().await;
        state.active_identity = Some(identity.to_string());
        upsert_record(&mut state, identity, |_| {});
        self.persist(&mut state).await?;
        info!(identity = %identity, "Active account updated");
        Ok(())
    }

    /// Remove the record and any live snapshot for `identity`.
    pub async fn evict(&self, identity: &str) -> Result<(), CastorError> {
        self.live.invalidate(identity);
        let mut state = self.state.lock().await;
        let before = state.records.len();
        state.records.retain(|r| r.identity != identity);
        if state.records.len() != before {
            self.persist(&mut state).await?;
            debug!(identity = %identity, "Cached account evicted");
        }
        Ok(())
    }

    pub fn set_live(&self, identity: &str, snapshot: UsageSnapshot) {
        self.live.insert(identity.to_string(), snapshot);
    }

    pub fn live(&self, identity: &str) -> Option<UsageSnapshot> {
        self.live.get(identity)
    }

    /// Display rows in cache order. Only the active record consults the live map.
    pub async fn display(&self) -> Vec<AccountDisplay> {
        let state = self.state.lock().await;
        let active = state.active_identity.as_deref();

        let mut records: Vec<&CachedAccountRecord> = state.records.iter().collect();
        records.sort_by(|a, b| compare_records(a, b, active));

        records
            .into_iter()
            .map(|record| {
                let is_active = active == Some(record.identity.as_str());
                let live = is_active.then(|| self.live.get(&record.identity)).flatten();
                let is_using_cached_data = record.snapshot.is_some() && live.is_none();
                AccountDisplay {
                    identity: record.identity.clone(),
                    is_active,
                    snapshot: live.or_else(|| record.snapshot.clone()),
                    source_label: record.source_label.clone(),
                    last_error: record.last_error.clone(),
                    updated_at: record.updated_at,
                    is_using_cached_data,
                }
            })
            .collect()
    }

    async fn mutate(
        &self,
        identity: &str,
        apply: impl FnOnce(&mut CachedAccountRecord),
    ) -> Result<(), CastorError> {
        let mut state = self.state.lock().await;
        upsert_record(&mut state, identity, apply);
        self.persist(&mut state).await
    }

    async fn persist(&self, state: &mut AccountCacheState) -> Result<(), CastorError> {
        let active = state.active_identity.clone();
        trim_records(&mut state.records, active.as_deref(), self.limit);
        let bytes = to_sorted_json(&*state)?;
        write_atomic(&self.path, &bytes).await?;
        Ok(())
    }
}

fn upsert_record(
    state: &mut AccountCacheState,
    identity: &str,
    apply: impl FnOnce(&mut CachedAccountRecord),
) {
    let index = match state.records.iter().position(|r| r.identity == identity) {
        Some(index) => index,
        None => {
            state.records.push(CachedAccountRecord::new(identity));
            state.records.len() - 1
        }
    };
    let record = &mut state.records[index];
    apply(record);
    record.updated_at = Utc::now();
}

async fn read_state(path: &Path) -> Result<AccountCacheState, CastorError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AccountCacheState::default()),
        Err(e) => Err(e.into()),
    }
}
