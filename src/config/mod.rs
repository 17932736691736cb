mod basic;
mod foreign_app;
mod oauth;
mod timing;
mod usage;

pub use basic::BasicConfig;
pub use foreign_app::{ForeignAppConfig, STATE_DB_RELATIVE, state_db_in};
pub use oauth::OauthConfig;
pub use timing::TimingConfig;
pub use usage::UsageConfig;

use crate::error::CastorError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
///
/// Built once at startup and shared as `Arc<Config>`; nothing mutates it afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core settings (see `basic` table in castor.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// OAuth client and flow settings (see `oauth` table).
    #[serde(default)]
    pub oauth: OauthConfig,

    /// Usage-quota upstream (see `usage` table).
    #[serde(default)]
    pub usage: UsageConfig,

    /// The application whose account is switched (see `foreign_app` table).
    #[serde(default)]
    pub foreign_app: ForeignAppConfig,

    /// Process supervision cadence (see `timing` table).
    #[serde(default)]
    pub timing: TimingConfig,
}

const DEFAULT_CONFIG_FILE: &str = "castor.toml";
const ENV_PREFIX: &str = "CASTOR_";

impl Config {
    /// Builds a Figment that merges defaults, an optional TOML file and `CASTOR_*` env vars.
    ///
    /// Nested keys use a double underscore, e.g. `CASTOR_BASIC__LOGLEVEL=debug`.
    pub fn figment(config_file: Option<PathBuf>) -> Figment {
        let path = config_file.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if path.is_file() {
            figment.merge(Toml::file(path))
        } else {
            figment
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(config_file: Option<PathBuf>) -> Result<Self, CastorError> {
        let mut cfg: Self = Self::figment(config_file)
            .extract()
            .map_err(|e| CastorError::Config(e.to_string()))?;
        if std::env::var_os("CI").is_some() {
            cfg.basic.skip_restart = true;
        }
        if cfg.basic.cache_limit == 0 {
            return Err(CastorError::Config(
                "basic.cache_limit must be at least 1".to_string(),
            ));
        }
        Ok(cfg)
    }

    /// Shared reqwest client honoring the proxy and request timeout settings.
    pub fn http_client(&self) -> Result<reqwest::Client, CastorError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("castor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(self.basic.request_timeout_secs))
            // Token endpoints must not follow redirects (oauth2 crate requirement).
            .redirect(reqwest::redirect::Policy::none());

        if let Some(proxy_url) = self.basic.proxy.as_ref() {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())?;
            builder = builder.proxy(proxy);
        }
        Ok(builder.build()?)
    }
}
