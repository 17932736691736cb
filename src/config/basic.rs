use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// Directory holding the credential database, tombstones and account cache.
    /// TOML: `basic.data_dir`. Default: the platform data directory for `castor`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Maximum number of cached account records kept on disk.
    /// TOML: `basic.cache_limit`. Default: `12`.
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,

    /// Skip restarting and verifying the foreign application after injection.
    /// TOML: `basic.skip_restart`. Forced on when the `CI` environment variable is set.
    #[serde(default)]
    pub skip_restart: bool,

    /// Optional HTTP proxy used for every outbound reqwest client.
    /// TOML: `basic.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Per-request timeout for outbound HTTP calls, in seconds.
    /// TOML: `basic.request_timeout_secs`. Default: `30`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            loglevel: default_loglevel(),
            cache_limit: default_cache_limit(),
            skip_restart: false,
            proxy: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BasicConfig {
    pub fn credentials_db_path(&self) -> PathBuf {
        self.data_dir.join("credentials.sqlite")
    }

    pub fn tombstones_path(&self) -> PathBuf {
        self.data_dir.join("tombstones.json")
    }

    pub fn account_cache_path(&self) -> PathBuf {
        self.data_dir.join("account-cache.json")
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "castor", "castor")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".castor"))
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_cache_limit() -> usize {
    12
}

fn default_request_timeout_secs() -> u64 {
    30
}
