use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity and on-disk locations of the application whose account is switched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignAppConfig {
    /// Display name, also used as the platform config directory name.
    /// TOML: `foreign_app.name`. Default: `Antigravity`.
    #[serde(default = "default_name")]
    pub name: String,

    /// Bundle identifier used for graceful quit requests (macOS).
    /// TOML: `foreign_app.bundle_id`. Default: `com.google.antigravity`.
    #[serde(default = "default_bundle_id")]
    pub bundle_id: String,

    /// Lowercase substring used to recognise the runtime when `install_path` is unknown.
    /// TOML: `foreign_app.process_name`. Default: `antigravity`.
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Install location. On macOS the `.app` bundle, elsewhere the executable.
    /// TOML: `foreign_app.install_path`.
    #[serde(default = "default_install_path")]
    pub install_path: Option<PathBuf>,

    /// State database used when no running process advertises `--user-data-dir`.
    /// TOML: `foreign_app.state_db_path`. Default: `<config dir>/<name>/User/globalStorage/state.vscdb`.
    #[serde(default)]
    pub state_db_path: Option<PathBuf>,
}

/// Relative location of the state database inside a user-data directory.
pub const STATE_DB_RELATIVE: [&str; 3] = ["User", "globalStorage", "state.vscdb"];

impl ForeignAppConfig {
    /// The well-known state database location for this platform.
    pub fn default_state_db_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.state_db_path.as_ref() {
            return Some(path.clone());
        }
        let base = directories::BaseDirs::new()?;
        Some(state_db_in(&base.config_dir().join(&self.name)))
    }
}

/// `<user_data_dir>/User/globalStorage/state.vscdb`
pub fn state_db_in(user_data_dir: &std::path::Path) -> PathBuf {
    STATE_DB_RELATIVE
        .iter()
        .fold(user_data_dir.to_path_buf(), |acc, part| acc.join(part))
}

impl Default for ForeignAppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            bundle_id: default_bundle_id(),
            process_name: default_process_name(),
            install_path: default_install_path(),
            state_db_path: None,
        }
    }
}

fn default_name() -> String {
    "Antigravity".to_string()
}

fn default_bundle_id() -> String {
    "com.google.antigravity".to_string()
}

fn default_process_name() -> String {
    "antigravity".to_string()
}

fn default_install_path() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        Some(PathBuf::from("/Applications/Antigravity.app"))
    } else {
        None
    }
}
