use super::{AccountManager, refreshable_credentials};
use crate::credentials::OAuthCredential;
use crate::error::CastorError;
use crate::usage::UsageSnapshot;
use futures::StreamExt;
use tracing::{info, warn};

/// Result of a background refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: Vec<String>,
    /// `(identity, error)` for every credential that could not be refreshed.
    pub failed: Vec<(String, String)>,
}

impl AccountManager {
    /// Refresh every inactive credential and its usage snapshot.
    ///
    /// Per-account failures are logged and recorded on the cached record; the batch continues.
    pub async fn refresh_inactive_accounts(&self) -> Result<RefreshSummary, CastorError> {
        let all = self.store.all_credentials().await?;
        let active = self.cache.active_identity().await;
        let targets = refreshable_credentials(&all, active.as_deref());
        let concurrency = usize::try_from(self.cfg.oauth.refresh_tps.max(1)).unwrap_or(1);

        let outcomes: Vec<(String, Result<(), CastorError>)> = futures::stream::iter(targets)
            .map(|credential| async move {
                self.refresh_limiter.until_ready().await;
                let identity = credential.email.clone();
                (identity, self.refresh_one(credential).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = RefreshSummary::default();
        for (identity, outcome) in outcomes {
            match outcome {
                Ok(()) => summary.refreshed.push(identity),
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Background refresh failed");
                    let label = self.usage.label().to_string();
                    if let Err(cache_err) =
                        self.cache.record_error(&identity, &e.to_string(), &label).await
                    {
                        warn!(identity = %identity, error = %cache_err, "Account cache write failed");
                    }
                    summary.failed.push((identity, e.to_string()));
                }
            }
        }
        summary.refreshed.sort();
        summary.failed.sort();

        info!(
            refreshed = summary.refreshed.len(),
            failed = summary.failed.len(),
            "Inactive account refresh finished"
        );
        Ok(summary)
    }

    async fn refresh_one(&self, credential: OAuthCredential) -> Result<(), CastorError> {
        let credential = self.ensure_fresh(credential).await?;
        self.populate_usage(&credential).await;
        Ok(())
    }

    /// Fetch the active account's usage into the live map and the cache.
    ///
    /// `Ok(None)` when there is no active account or the fetch failed.
    pub async fn refresh_active_usage(&self) -> Result<Option<UsageSnapshot>, CastorError> {
        let Some(active) = self.cache.active_identity().await else {
            return Ok(None);
        };
        let Some(credential) = self.store.credential(&active).await? else {
            return Ok(None);
        };

        let credential = self.ensure_fresh(credential).await?;
        let snapshot = self.populate_usage(&credential).await;
        if let Some(snapshot) = &snapshot {
            self.cache.set_live(&active, snapshot.clone());
        }
        Ok(snapshot)
    }
}
