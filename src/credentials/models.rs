use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored OAuth credential for one Google account.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct OAuthCredential {
    /// Normalized identity (trimmed, lowercased email).
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expiry: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthCredential {
    /// True when the access token expires within `lead` of `now` (or already has).
    pub fn needs_refresh(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        self.expiry <= now + lead
    }
}

impl std::fmt::Debug for OAuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredential")
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
