use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Google OAuth settings used for the add/refresh flows.
///
/// Defaults are the foreign application's own desktop client so that tokens
/// minted here are accepted when injected into its state store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OauthConfig {
    /// TOML: `oauth.auth_url`. Default: `https://accounts.google.com/o/oauth2/v2/auth`.
    #[serde(default = "default_auth_url")]
    pub auth_url: Url,

    /// TOML: `oauth.token_url`. Default: `https://oauth2.googleapis.com/token`.
    #[serde(default = "default_token_url")]
    pub token_url: Url,

    /// Profile endpoint returning the account email.
    /// TOML: `oauth.userinfo_url`. Default: `https://www.googleapis.com/oauth2/v2/userinfo`.
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: Url,

    /// TOML: `oauth.client_id`.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Omitted from token requests when unset.
    /// TOML: `oauth.client_secret`.
    #[serde(default = "default_client_secret")]
    pub client_secret: Option<String>,

    /// TOML: `oauth.scopes`.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// How long to wait for the browser redirect, in seconds.
    /// TOML: `oauth.callback_timeout_secs`. Default: `240`.
    #[serde(default = "default_callback_timeout_secs")]
    pub callback_timeout_secs: u64,

    /// Credentials expiring within this many seconds are refreshed before use.
    /// TOML: `oauth.refresh_lead_secs`. Default: `300`.
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: i64,

    /// Refresh requests per second for the background refresh batch.
    /// TOML: `oauth.refresh_tps`. Default: `2`.
    #[serde(default = "default_refresh_tps")]
    pub refresh_tps: u32,
}

impl OauthConfig {
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn refresh_lead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_lead_secs)
    }
}

impl Default for OauthConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            userinfo_url: default_userinfo_url(),
            client_id: default_client_id(),
            client_secret: default_client_secret(),
            scopes: default_scopes(),
            callback_timeout_secs: default_callback_timeout_secs(),
            refresh_lead_secs: default_refresh_lead_secs(),
            refresh_tps: default_refresh_tps(),
        }
    }
}

fn default_auth_url() -> Url {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth")
        .expect("default oauth auth_url must be a valid URL")
}

fn default_token_url() -> Url {
    Url::parse("https://oauth2.googleapis.com/token")
        .expect("default oauth token_url must be a valid URL")
}

fn default_userinfo_url() -> Url {
    Url::parse("https://www.googleapis.com/oauth2/v2/userinfo")
        .expect("default oauth userinfo_url must be a valid URL")
}

fn default_client_id() -> String {
    "1071006060591-tmhssin2h21lcre235vtolojh4g403ep.apps.googleusercontent.com".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_client_secret() -> Option<String> {
    Some("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".to_string())
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/cloud-platform".to_string(),
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
        "https://www.googleapis.com/auth/cclog".to_string(),
        "https://www.googleapis.com/auth/experimentsandconfigs".to_string(),
    ]
}

fn default_callback_timeout_secs() -> u64 {
    240
}

fn default_refresh_lead_secs() -> i64 {
    300
}

fn default_refresh_tps() -> u32 {
    2
}
