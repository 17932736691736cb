use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Usage-quota upstream used to pre-populate account snapshots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    /// Base API URL for the cloud code upstream.
    /// TOML: `usage.api_url`. Default: `https://cloudcode-pa.googleapis.com`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Last-resort project id tried when discovery yields nothing usable.
    /// TOML: `usage.default_project_id`.
    #[serde(default = "default_project_id")]
    pub default_project_id: String,

    /// How long a live snapshot is preferred over the cached one, in seconds.
    /// TOML: `usage.live_ttl_secs`. Default: `300`.
    #[serde(default = "default_live_ttl_secs")]
    pub live_ttl_secs: u64,
}

impl UsageConfig {
    pub fn live_ttl(&self) -> Duration {
        Duration::from_secs(self.live_ttl_secs)
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            default_project_id: default_project_id(),
            live_ttl_secs: default_live_ttl_secs(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://cloudcode-pa.googleapis.com")
        .expect("default usage api_url must be a valid URL")
}

fn default_project_id() -> String {
    "bamboo-precept-lgxtn".to_string()
}

fn default_live_ttl_secs() -> u64 {
    300
}
