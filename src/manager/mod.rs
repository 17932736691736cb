//! Orchestrates add / switch / remove and background refresh over the store,
//! cache, injector and supervisor.

mod add;
mod refresh;
mod switch;

pub use refresh::RefreshSummary;

use crate::browser::{BrowserOpener, SystemBrowser};
use crate::cache::{AccountCache, AccountDisplay};
use crate::config::Config;
use crate::credentials::{CredentialStore, OAuthCredential};
use crate::error::CastorError;
use crate::injector::StateInjector;
use crate::oauth::GoogleOauthEndpoints;
use crate::probe::StatusProbe;
use crate::supervisor::{OsCollaborators, ProcessSupervisor};
use crate::usage::{CloudCodeUsageFetcher, UsageFetcher, UsageSnapshot};
use crate::utils::identity::{normalize_identity, same_identity};
use ahash::AHashSet;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

/// Progress of the add-account flow, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPhase {
    Idle,
    Requesting,
    WaitingOnCallback,
    Exchanging,
    FetchingProfile,
    Cached,
}

/// Injectable collaborators. Tests swap in fakes; [`Collaborators::system`] wires the real ones.
#[derive(Clone)]
pub struct Collaborators {
    pub browser: Arc<dyn BrowserOpener>,
    pub usage: Arc<dyn UsageFetcher>,
    pub os: OsCollaborators,
    /// Overrides the status probe; by default the resolved state database is read back.
    pub probe: Option<Arc<dyn StatusProbe>>,
}

impl Collaborators {
    pub fn system(cfg: &Config, http_client: reqwest::Client) -> Self {
        Self {
            browser: Arc::new(SystemBrowser),
            usage: Arc::new(CloudCodeUsageFetcher::new(cfg.usage.clone(), http_client)),
            os: OsCollaborators::default(),
            probe: None,
        }
    }
}

pub struct AccountManager {
    cfg: Arc<Config>,
    http_client: reqwest::Client,
    store: CredentialStore,
    cache: AccountCache,
    injector: StateInjector,
    supervisor: ProcessSupervisor,
    browser: Arc<dyn BrowserOpener>,
    usage: Arc<dyn UsageFetcher>,
    probe: Option<Arc<dyn StatusProbe>>,
    add_guard: Mutex<()>,
    phase_tx: watch::Sender<AddPhase>,
    refresh_limiter: DefaultDirectRateLimiter,
}

impl AccountManager {
    /// Open the credential store and account cache under `basic.data_dir`,
    /// pruning cached records that no longer have a credential.
    pub async fn open(
        cfg: Arc<Config>,
        http_client: reqwest::Client,
        collaborators: Collaborators,
    ) -> Result<Self, CastorError> {
        let store = CredentialStore::open(
            &cfg.basic.credentials_db_path(),
            cfg.basic.tombstones_path(),
        )
        .await?;
        let cache = AccountCache::load(
            cfg.basic.account_cache_path(),
            cfg.basic.cache_limit,
            cfg.usage.live_ttl(),
        )
        .await;

        let valid: AHashSet<String> = store
            .all_credentials()
            .await?
            .into_iter()
            .map(|c| c.email)
            .collect();
        cache.prune(&valid).await?;

        let supervisor = ProcessSupervisor::new(
            cfg.foreign_app.clone(),
            cfg.timing,
            collaborators.os.clone(),
        );

        let tps = NonZeroU32::new(cfg.oauth.refresh_tps.max(1)).unwrap_or(NonZeroU32::MIN);
        let (phase_tx, _) = watch::channel(AddPhase::Idle);

        info!(
            data_dir = %cfg.basic.data_dir.display(),
            accounts = valid.len(),
            skip_restart = cfg.basic.skip_restart,
            "Account manager ready"
        );
        Ok(Self {
            http_client,
            store,
            cache,
            injector: StateInjector,
            supervisor,
            browser: collaborators.browser,
            usage: collaborators.usage,
            probe: collaborators.probe,
            add_guard: Mutex::new(()),
            phase_tx,
            refresh_limiter: RateLimiter::direct(Quota::per_second(tps)),
            cfg,
        })
    }

    pub fn subscribe_phases(&self) -> watch::Receiver<AddPhase> {
        self.phase_tx.subscribe()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn cache(&self) -> &AccountCache {
        &self.cache
    }

    /// The account list in display order.
    pub async fn accounts(&self) -> Vec<AccountDisplay> {
        self.cache.display().await
    }

    pub async fn active_identity(&self) -> Option<String> {
        self.cache.active_identity().await
    }

    /// Tombstone an inactive account and drop its cached record.
    pub async fn remove_account(&self, identity: &str) -> Result<(), CastorError> {
        let identity = normalize_identity(identity).ok_or(CastorError::AccountEmailUnavailable)?;
        if self
            .cache
            .active_identity()
            .await
            .is_some_and(|active| active == identity)
        {
            return Err(CastorError::CannotRemoveActive(identity));
        }

        self.store.remove(&identity).await?;
        self.cache.evict(&identity).await?;
        info!(identity = %identity, "Account removed");
        Ok(())
    }

    fn set_phase(&self, phase: AddPhase) {
        self.phase_tx.send_replace(phase);
        tracing::debug!(?phase, "Add-account phase");
    }

    /// Run a refresh-token grant when the access token expires within the lead time.
    /// The refreshed credential is persisted before it is returned.
    async fn ensure_fresh(
        &self,
        credential: OAuthCredential,
    ) -> Result<OAuthCredential, CastorError> {
        if !credential.needs_refresh(Utc::now(), self.cfg.oauth.refresh_lead()) {
            return Ok(credential);
        }

        info!(identity = %credential.email, expiry = %credential.expiry, "Refreshing access token");
        let grant = GoogleOauthEndpoints::refresh_access_token(
            &self.cfg.oauth,
            &credential.refresh_token,
            &self.http_client,
        )
        .await
        .map_err(|e| CastorError::RefreshFailed(e.to_string()))?;

        let refreshed = OAuthCredential {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or(credential.refresh_token),
            expiry: grant.expires_at,
            ..credential
        };
        self.store.upsert(refreshed).await
    }

    /// Best-effort usage fetch; failures become the record's `last_error`.
    async fn populate_usage(&self, credential: &OAuthCredential) -> Option<UsageSnapshot> {
        let label = self.usage.label().to_string();
        let identity = credential.email.as_str();

        let (snapshot, write) = match self.usage.fetch(credential).await {
            Ok(snapshot) => {
                crate::utils::logging::debug_json("Usage snapshot", identity, &snapshot);
                let write = self
                    .cache
                    .record_snapshot(identity, snapshot.clone(), &label)
                    .await;
                (Some(snapshot), write)
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Usage fetch failed; caching without snapshot");
                let write = self.cache.record_error(identity, &e.to_string(), &label).await;
                (None, write)
            }
        };

        if let Err(e) = write {
            warn!(identity = %identity, error = %e, "Account cache write failed");
        }
        snapshot
    }
}

/// Credentials other than the active one, in input order.
pub fn refreshable_credentials(
    credentials: &[OAuthCredential],
    active_identity: Option<&str>,
) -> Vec<OAuthCredential> {
    credentials
        .iter()
        .filter(|c| !active_identity.is_some_and(|active| same_identity(&c.email, active)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(email: &str) -> OAuthCredential {
        OAuthCredential {
            email: email.to_string(),
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            expiry: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn emails(creds: &[OAuthCredential]) -> Vec<&str> {
        creds.iter().map(|c| c.email.as_str()).collect()
    }

    #[test]
    fn active_is_excluded_case_insensitively() {
        let all = [cred("c@x"), cred("a@x"), cred("b@x")];
        let out = refreshable_credentials(&all, Some("  A@X "));
        assert_eq!(emails(&out), ["c@x", "b@x"]);
    }

    #[test]
    fn no_active_keeps_everything_in_order() {
        let all = [cred("c@x"), cred("a@x")];
        assert_eq!(emails(&refreshable_credentials(&all, None)), ["c@x", "a@x"]);
        assert_eq!(
            emails(&refreshable_credentials(&all, Some("nobody@x"))),
            ["c@x", "a@x"]
        );
    }

    #[test]
    fn empty_input() {
        assert!(refreshable_credentials(&[], Some("a@x")).is_empty());
    }
}
