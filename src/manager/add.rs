use super::{AccountManager, AddPhase};
use crate::credentials::OAuthCredential;
use crate::error::CastorError;
use crate::oauth::{GoogleOauthEndpoints, OAuthCallbackServer};
use crate::utils::identity::normalize_identity;
use chrono::Utc;
use subtle::ConstantTimeEq;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl AccountManager {
    /// Run the browser authorization flow and store the resulting credential.
    ///
    /// Returns the normalized identity. The account is not made active.
    /// Only one add can run at a time; a concurrent call fails with `AddInProgress`.
    pub async fn add_account(&self, cancel: &CancellationToken) -> Result<String, CastorError> {
        let _guard = self
            .add_guard
            .try_lock()
            .map_err(|_| CastorError::AddInProgress)?;

        let result = self.run_add(cancel).await;
        if let Err(e) = &result {
            warn!(error = %e, "Add account failed");
        }
        self.set_phase(AddPhase::Idle);
        result
    }

    async fn run_add(&self, cancel: &CancellationToken) -> Result<String, CastorError> {
        let oauth = &self.cfg.oauth;

        self.set_phase(AddPhase::Requesting);
        let server = OAuthCallbackServer::start().await?;
        let redirect_uri = server.redirect_uri().clone();
        let (auth_url, csrf_token) =
            GoogleOauthEndpoints::build_authorize_url(oauth, &redirect_uri)?;
        self.browser.open(&auth_url)?;
        info!(redirect_uri = %redirect_uri, "Authorization page opened; waiting for callback");

        self.set_phase(AddPhase::WaitingOnCallback);
        let callback = server
            .wait_for_callback(oauth.callback_timeout(), cancel)
            .await?;

        let state_matches: bool = callback
            .state
            .as_bytes()
            .ct_eq(csrf_token.secret().as_bytes())
            .into();
        if !state_matches {
            return Err(CastorError::StateMismatch);
        }

        self.set_phase(AddPhase::Exchanging);
        let grant = GoogleOauthEndpoints::exchange_authorization_code(
            oauth,
            &redirect_uri,
            &callback.code,
            &self.http_client,
        )
        .await
        .map_err(|e| CastorError::TokenExchangeFailed(e.to_string()))?;
        let refresh_token = grant
            .refresh_token
            .clone()
            .ok_or(CastorError::RefreshTokenMissing)?;

        self.set_phase(AddPhase::FetchingProfile);
        let email = GoogleOauthEndpoints::fetch_profile_email(
            oauth,
            &grant.access_token,
            &self.http_client,
        )
        .await
        .map_err(|e| CastorError::ProfileFetchFailed(e.to_string()))?;
        let identity = normalize_identity(&email).ok_or(CastorError::AccountEmailUnavailable)?;

        let credential = self
            .store
            .upsert(OAuthCredential {
                email: identity.clone(),
                access_token: grant.access_token,
                refresh_token,
                expiry: grant.expires_at,
                updated_at: Utc::now(),
            })
            .await?;

        self.set_phase(AddPhase::Cached);
        self.populate_usage(&credential).await;

        info!(identity = %identity, "Account added");
        Ok(identity)
    }
}
