use thiserror::Error as ThisError;

use super::oauth::OauthError;

#[derive(Debug, ThisError)]
pub enum CastorError {
    // Input errors.
    #[error("account email unavailable")]
    AccountEmailUnavailable,

    #[error("account {0} has not been added")]
    AccountNotAdded(String),

    #[error("cannot remove the active account {0}; switch to another account first")]
    CannotRemoveActive(String),

    // OAuth flow errors.
    #[error("failed to open the system browser: {0}")]
    BrowserOpenFailed(String),

    #[error("authorization callback did not carry a code")]
    CodeMissing,

    #[error("authorization callback state did not match the request")]
    StateMismatch,

    #[error("timed out waiting for the authorization callback")]
    TimedOut,

    #[error("operation cancelled")]
    Cancelled,

    #[error("another add-account flow is already in progress")]
    AddInProgress,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("token response did not include a refresh token (offline access not granted)")]
    RefreshTokenMissing,

    #[error("credential refresh failed: {0}")]
    RefreshFailed(String),

    #[error("profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    // Storage errors.
    #[error("foreign state database not found")]
    DatabaseNotFound,

    #[error("failed to open foreign state database: {0}")]
    DatabaseOpenFailed(String),

    #[error("failed to write foreign state database: {0}")]
    DatabaseWriteFailed(String),

    #[error("credential storage error: {0}")]
    Storage(#[from] sqlx::Error),

    // Process errors.
    #[error("failed to start the local callback listener: {0}")]
    ListenerStartFailed(String),

    #[error("failed to list processes: {0}")]
    ProcessList(String),

    #[error("failed to launch the application: {0}")]
    LaunchFailed(String),

    #[error(
        "switch applied but not confirmed: expected {expected}, application reports {}",
        .last_observed.as_deref().unwrap_or("no account")
    )]
    SwitchVerificationFailed {
        expected: String,
        last_observed: Option<String>,
    },

    // Ambient.
    #[error(transparent)]
    Oauth(#[from] OauthError),

    #[error("wire format error: {0}")]
    Wire(#[from] castor_wire::WireError),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CastorError {
    /// True for the non-destructive "applied but unconfirmed" outcome of a switch.
    pub fn is_unconfirmed_switch(&self) -> bool {
        matches!(self, CastorError::SwitchVerificationFailed { .. })
    }
}
