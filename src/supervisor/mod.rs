//! Discovery, termination, relaunch and post-switch verification of the foreign application.

mod classify;
mod system;

pub use classify::{
    ProcessInfo, install_path_from_command, is_helper, main_processes, matches_app,
    parse_user_data_dir,
};
pub use system::{NixSignals, PsProcessLister, SystemLauncher, SystemQuitter};

use crate::config::{ForeignAppConfig, TimingConfig, state_db_in};
use crate::error::CastorError;
use crate::probe::StatusProbe;
use crate::utils::identity::same_identity;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[async_trait]
pub trait ProcessLister: Send + Sync {
    async fn list(&self) -> Result<Vec<ProcessInfo>, CastorError>;

    /// Zero-signal liveness probe.
    fn is_alive(&self, pid: u32) -> bool;
}

pub trait SignalSender: Send + Sync {
    fn terminate(&self, pid: u32) -> Result<(), CastorError>;
    fn kill(&self, pid: u32) -> Result<(), CastorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitRequest {
    Requested,
    Unavailable,
}

#[async_trait]
pub trait AppQuitter: Send + Sync {
    async fn quit(&self, bundle_id: &str) -> QuitRequest;
}

#[async_trait]
pub trait AppLauncher: Send + Sync {
    async fn launch(&self, install_path: &Path, args: &[String]) -> Result<(), CastorError>;
}

/// OS collaborators used by [`ProcessSupervisor`].
#[derive(Clone)]
pub struct OsCollaborators {
    pub lister: Arc<dyn ProcessLister>,
    pub signals: Arc<dyn SignalSender>,
    pub quitter: Arc<dyn AppQuitter>,
    pub launcher: Arc<dyn AppLauncher>,
}

impl Default for OsCollaborators {
    fn default() -> Self {
        Self {
            lister: Arc::new(PsProcessLister),
            signals: Arc::new(NixSignals),
            quitter: Arc::new(SystemQuitter),
            launcher: Arc::new(SystemLauncher),
        }
    }
}

/// What `terminate` did and which processes outlived it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationOutcome {
    pub graceful_quit_requested: bool,
    pub signalled: Vec<u32>,
    pub killed: Vec<u32>,
    pub survivors: Vec<u32>,
    pub cancelled: bool,
}

/// Snapshot of the running foreign application taken before a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningApp {
    pub processes: Vec<ProcessInfo>,
}

impl RunningApp {
    pub fn is_running(&self) -> bool {
        !self.processes.is_empty()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.processes.iter().map(|p| p.pid).collect()
    }

    /// `--user-data-dir` advertised by a main process.
    pub fn user_data_dir(&self) -> Option<PathBuf> {
        main_processes(&self.processes)
            .into_iter()
            .find_map(|p| parse_user_data_dir(&p.command))
    }

    fn install_path(&self) -> Option<PathBuf> {
        main_processes(&self.processes)
            .into_iter()
            .find_map(|p| install_path_from_command(&p.command))
    }
}

enum Wait {
    AllExited,
    Survivors(Vec<u32>),
    Cancelled,
}

pub struct ProcessSupervisor {
    app: ForeignAppConfig,
    timing: TimingConfig,
    os: OsCollaborators,
}

impl ProcessSupervisor {
    pub fn new(app: ForeignAppConfig, timing: TimingConfig, os: OsCollaborators) -> Self {
        Self { app, timing, os }
    }

    /// Processes of the foreign application, excluding this process.
    pub async fn discover(&self) -> Result<RunningApp, CastorError> {
        let own_pid = std::process::id();
        let processes: Vec<ProcessInfo> = self
            .os
            .lister
            .list()
            .await?
            .into_iter()
            .filter(|p| p.pid != own_pid)
            .filter(|p| matches_app(p, self.app.install_path.as_deref(), &self.app.process_name))
            .collect();

        debug!(
            count = processes.len(),
            pids = ?processes.iter().map(|p| p.pid).collect::<Vec<_>>(),
            "Foreign application processes discovered"
        );
        Ok(RunningApp { processes })
    }

    /// State database: running `--user-data-dir`, then the configured default.
    pub fn resolve_state_db(&self, running: &RunningApp) -> Result<PathBuf, CastorError> {
        if let Some(dir) = running.user_data_dir() {
            let path = state_db_in(&dir);
            if path.is_file() {
                debug!(path = %path.display(), "State database resolved from running process");
                return Ok(path);
            }
            warn!(path = %path.display(), "Advertised state database missing; trying default location");
        }

        match self.app.default_state_db_path() {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(CastorError::DatabaseNotFound),
        }
    }

    /// Quit gracefully when possible, otherwise signal; escalate to SIGKILL after the deadline.
    ///
    /// Survivors are reported, not treated as an error.
    pub async fn terminate(
        &self,
        running: &RunningApp,
        cancel: &CancellationToken,
    ) -> TerminationOutcome {
        let mut outcome = TerminationOutcome::default();
        let pids = running.pids();
        if pids.is_empty() {
            return outcome;
        }

        match self.os.quitter.quit(&self.app.bundle_id).await {
            QuitRequest::Requested => {
                outcome.graceful_quit_requested = true;
                info!(bundle_id = %self.app.bundle_id, "Graceful quit requested");
            }
            QuitRequest::Unavailable => {
                for process in main_processes(&running.processes) {
                    match self.os.signals.terminate(process.pid) {
                        Ok(()) => outcome.signalled.push(process.pid),
                        Err(e) => warn!(pid = process.pid, error = %e, "SIGTERM failed"),
                    }
                }
                info!(pids = ?outcome.signalled, "Terminate signal sent");
            }
        }

        let survivors = match self
            .wait_for_exit(&pids, self.timing.terminate_timeout(), cancel)
            .await
        {
            Wait::AllExited => return outcome,
            Wait::Cancelled => {
                outcome.cancelled = true;
                return outcome;
            }
            Wait::Survivors(survivors) => survivors,
        };

        for pid in &survivors {
            match self.os.signals.kill(*pid) {
                Ok(()) => outcome.killed.push(*pid),
                Err(e) => warn!(pid, error = %e, "SIGKILL failed"),
            }
        }
        warn!(pids = ?outcome.killed, "Force-killed processes that outlived the terminate deadline");

        match self
            .wait_for_exit(&survivors, self.timing.kill_timeout(), cancel)
            .await
        {
            Wait::AllExited => {}
            Wait::Cancelled => outcome.cancelled = true,
            Wait::Survivors(left) => {
                warn!(pids = ?left, "Processes still alive after SIGKILL");
                outcome.survivors = left;
            }
        }
        outcome
    }

    /// Launch the application again with the `--user-data-dir` it was running with, if any.
    pub async fn relaunch(&self, running: &RunningApp) -> Result<(), CastorError> {
        let install_path = self
            .app
            .install_path
            .clone()
            .or_else(|| running.install_path())
            .ok_or_else(|| {
                CastorError::LaunchFailed(format!("install location of {} is unknown", self.app.name))
            })?;

        let args: Vec<String> = running
            .user_data_dir()
            .map(|dir| vec![format!("--user-data-dir={}", dir.display())])
            .unwrap_or_default();

        self.os.launcher.launch(&install_path, &args).await?;
        info!(path = %install_path.display(), "Application relaunched");
        Ok(())
    }

    /// Poll `probe` until the relaunched application is running and reports `expected`,
    /// or the relaunch deadline passes.
    ///
    /// Probe readings taken while no application process is running are ignored.
    /// Cancellation ends the wait with `Ok(())`.
    pub async fn verify(
        &self,
        probe: &dyn StatusProbe,
        expected: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CastorError> {
        let deadline = Instant::now() + self.timing.relaunch_timeout();
        let mut last_observed: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                debug!("Verification cancelled");
                return Ok(());
            }

            match self.discover().await {
                Ok(running) if running.is_running() => match probe.active_identity().await {
                    Ok(Some(observed)) if same_identity(&observed, expected) => {
                        info!(identity = %expected, "Switch verified");
                        return Ok(());
                    }
                    Ok(observed) => {
                        if observed.is_some() {
                            last_observed = observed;
                        }
                    }
                    Err(e) => debug!(error = %e, "Status probe failed; retrying"),
                },
                Ok(_) => debug!("Relaunched application not running yet"),
                Err(e) => debug!(error = %e, "Process discovery failed; retrying"),
            }

            if Instant::now() >= deadline {
                return Err(CastorError::SwitchVerificationFailed {
                    expected: expected.to_string(),
                    last_observed,
                });
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Verification cancelled");
                    return Ok(());
                }
                () = tokio::time::sleep(self.timing.verify_interval()) => {}
            }
        }
    }

    async fn wait_for_exit(
        &self,
        pids: &[u32],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Wait {
        let deadline = Instant::now() + timeout;
        loop {
            let alive: Vec<u32> = pids
                .iter()
                .copied()
                .filter(|pid| self.os.lister.is_alive(*pid))
                .collect();
            if alive.is_empty() {
                return Wait::AllExited;
            }
            if Instant::now() >= deadline {
                return Wait::Survivors(alive);
            }

            tokio::select! {
                () = cancel.cancelled() => return Wait::Cancelled,
                () = tokio::time::sleep(self.timing.poll_interval()) => {}
            }
        }
    }
}
