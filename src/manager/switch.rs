use super::AccountManager;
use crate::error::CastorError;
use crate::injector::InjectionReport;
use crate::probe::{StatusProbe, StoreStatusProbe};
use crate::supervisor::RunningApp;
use crate::utils::identity::normalize_identity;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl AccountManager {
    /// Make `identity` the account the foreign application is signed in as.
    ///
    /// A failed launch or verification still marks the account active before the
    /// error is returned; the refreshed credential and injected state are kept.
    pub async fn switch_account(
        &self,
        identity: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CastorError> {
        let identity = normalize_identity(identity).ok_or(CastorError::AccountEmailUnavailable)?;

        let Some(credential) = self.store.credential(&identity).await? else {
            let active = self.cache.active_identity().await;
            if active.as_deref() != Some(identity.as_str()) {
                if let Err(e) = self.cache.evict(&identity).await {
                    warn!(identity = %identity, error = %e, "Failed to evict stale cache record");
                }
            }
            return Err(CastorError::AccountNotAdded(identity));
        };

        let credential = self.ensure_fresh(credential).await?;

        let running = match self.supervisor.discover().await {
            Ok(running) => running,
            Err(e) => {
                warn!(error = %e, "Process discovery failed; assuming the application is not running");
                RunningApp::default()
            }
        };
        let db_path = self.supervisor.resolve_state_db(&running)?;
        let report = self.injector.inject(&db_path, &credential).await?;

        let restart_result = if self.cfg.basic.skip_restart {
            info!("Restart skipped by configuration");
            Ok(())
        } else {
            self.restart_and_verify(&running, &db_path, &identity, &report, cancel)
                .await
        };

        self.cache.set_active(&identity).await?;
        match &restart_result {
            Ok(()) => info!(identity = %identity, "Switched account"),
            Err(e) => warn!(identity = %identity, error = %e, "Switch applied but not confirmed"),
        }
        restart_result
    }

    async fn restart_and_verify(
        &self,
        running: &RunningApp,
        db_path: &Path,
        identity: &str,
        report: &InjectionReport,
        cancel: &CancellationToken,
    ) -> Result<(), CastorError> {
        let outcome = self.supervisor.terminate(running, cancel).await;
        if outcome.cancelled {
            info!("Restart cancelled; the new credential is already written");
            return Ok(());
        }

        self.supervisor.relaunch(running).await?;

        let probe: Arc<dyn StatusProbe> = match &self.probe {
            Some(probe) => probe.clone(),
            // The store probe only reads the legacy record.
            None if !report.legacy.is_written() => {
                warn!(identity = %identity, "No legacy state record; switch cannot be verified");
                return Ok(());
            }
            None => Arc::new(StoreStatusProbe::new(db_path)),
        };
        self.supervisor.verify(probe.as_ref(), identity, cancel).await
    }
}
