use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling cadence and deadlines for process supervision.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Liveness poll interval while waiting for termination.
    /// TOML: `timing.poll_interval_ms`. Default: `250`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deadline for the graceful/terminate phase.
    /// TOML: `timing.terminate_timeout_ms`. Default: `5000`.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,

    /// Deadline after force-killing survivors.
    /// TOML: `timing.kill_timeout_ms`. Default: `2000`.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    /// Status probe interval during verification (never below 500).
    /// TOML: `timing.verify_interval_ms`. Default: `500`.
    #[serde(default = "default_verify_interval_ms")]
    pub verify_interval_ms: u64,

    /// Overall deadline for the relaunched application to report the new identity.
    /// TOML: `timing.relaunch_timeout_ms`. Default: `14000`.
    #[serde(default = "default_relaunch_timeout_ms")]
    pub relaunch_timeout_ms: u64,
}

const MIN_VERIFY_INTERVAL_MS: u64 = 500;

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms.max(MIN_VERIFY_INTERVAL_MS))
    }

    pub fn relaunch_timeout(&self) -> Duration {
        Duration::from_millis(self.relaunch_timeout_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            terminate_timeout_ms: default_terminate_timeout_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
            verify_interval_ms: default_verify_interval_ms(),
            relaunch_timeout_ms: default_relaunch_timeout_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_terminate_timeout_ms() -> u64 {
    5000
}

fn default_kill_timeout_ms() -> u64 {
    2000
}

fn default_verify_interval_ms() -> u64 {
    500
}

fn default_relaunch_timeout_ms() -> u64 {
    14_000
}
