use crate::config::OauthConfig;
use crate::error::{CastorError, OauthError};
use crate::oauth_utils::{GoogleOauth2Client, OauthTokenResponse, build_oauth2_client};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oauth2::{AuthorizationCode, CsrfToken, RedirectUrl, RefreshToken, Scope, TokenResponse};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

/// Token lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Tokens minted by a code exchange or refresh grant.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<OauthTokenResponse> for TokenGrant {
    fn from(token: OauthTokenResponse) -> Self {
        let expires_in = token
            .expires_in()
            .and_then(|d| ChronoDuration::from_std(d).ok())
            .unwrap_or_else(|| ChronoDuration::seconds(DEFAULT_EXPIRES_IN_SECS));
        Self {
            access_token: token.access_token().secret().to_string(),
            refresh_token: token
                .refresh_token()
                .map(|t| t.secret().trim().to_string())
                .filter(|t| !t.is_empty()),
            expires_at: Utc::now() + expires_in,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    email: Option<String>,
}

/// Stateless Google OAuth endpoints built from [`OauthConfig`].
///
/// A fresh oauth2 client is built per call so tests can point each call at a mock server.
pub struct GoogleOauthEndpoints;

impl GoogleOauthEndpoints {
    fn build_client(
        cfg: &OauthConfig,
        redirect_uri: Option<&Url>,
    ) -> Result<GoogleOauth2Client, CastorError> {
        let redirect = redirect_uri
            .map(|u| RedirectUrl::new(u.to_string()))
            .transpose()?;
        build_oauth2_client(
            &cfg.client_id,
            cfg.client_secret.as_deref(),
            cfg.auth_url.as_str(),
            cfg.token_url.as_str(),
            redirect,
        )
    }

    /// Authorization URL with a random state nonce, offline access and forced account chooser.
    pub fn build_authorize_url(
        cfg: &OauthConfig,
        redirect_uri: &Url,
    ) -> Result<(Url, CsrfToken), CastorError> {
        let client = Self::build_client(cfg, Some(redirect_uri))?;
        let mut req = client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "select_account consent");

        for scope in &cfg.scopes {
            req = req.add_scope(Scope::new(scope.clone()));
        }

        Ok(req.url())
    }

    /// Exchange an authorization code (`grant_type=authorization_code`).
    pub async fn exchange_authorization_code(
        cfg: &OauthConfig,
        redirect_uri: &Url,
        code: &str,
        http_client: &reqwest::Client,
    ) -> Result<TokenGrant, OauthError> {
        let client = Self::build_client(cfg, Some(redirect_uri)).map_err(|e| OauthError::Other {
            message: format!("failed to build oauth2 client: {e}"),
        })?;

        let token: OauthTokenResponse = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(http_client)
            .await?;

        info!("OAuth2 code exchange completed successfully");
        Ok(token.into())
    }

    /// Refresh an access token (`grant_type=refresh_token`).
    ///
    /// The returned grant keeps `refresh_token` as `None` when the endpoint did not rotate it.
    pub async fn refresh_access_token(
        cfg: &OauthConfig,
        refresh_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<TokenGrant, OauthError> {
        let client = Self::build_client(cfg, None).map_err(|e| OauthError::Other {
            message: format!("failed to build oauth2 client: {e}"),
        })?;

        let token: OauthTokenResponse = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(http_client)
            .await?;

        debug!("OAuth2 refresh grant completed");
        Ok(token.into())
    }

    /// Fetch the account email from the profile endpoint. Returns an empty string when absent.
    pub async fn fetch_profile_email(
        cfg: &OauthConfig,
        access_token: &str,
        http_client: &reqwest::Client,
    ) -> Result<String, OauthError> {
        let resp = http_client
            .get(cfg.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OauthError::UpstreamStatus(status));
        }

        let body = resp.bytes().await?;
        let info: UserInfo = serde_json::from_slice(&body).map_err(|e| OauthError::Parse {
            message: e.to_string(),
            body: crate::error::oauth_body_preview(&body),
        })?;
        Ok(info.email.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg() -> OauthConfig {
        OauthConfig {
            client_id: "client-id".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            ..OauthConfig::default()
        }
    }

    #[test]
    fn authorize_url_carries_offline_access_and_account_chooser() {
        let redirect = Url::parse("http://127.0.0.1:4567/oauth-callback").unwrap();
        let (url, state) = GoogleOauthEndpoints::build_authorize_url(&cfg(), &redirect).unwrap();

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params.get("access_type").map(String::as_str), Some("offline"));
        assert_eq!(
            params.get("prompt").map(String::as_str),
            Some("select_account consent")
        );
        assert_eq!(params.get("scope").map(String::as_str), Some("openid email"));
        assert_eq!(
            params.get("redirect_uri").map(String::as_str),
            Some("http://127.0.0.1:4567/oauth-callback")
        );
        assert_eq!(params.get("state"), Some(state.secret()));
        assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
    }

    #[test]
    fn each_authorize_url_gets_a_fresh_nonce() {
        let redirect = Url::parse("http://127.0.0.1:1/oauth-callback").unwrap();
        let (_, a) = GoogleOauthEndpoints::build_authorize_url(&cfg(), &redirect).unwrap();
        let (_, b) = GoogleOauthEndpoints::build_authorize_url(&cfg(), &redirect).unwrap();
        assert_ne!(a.secret(), b.secret());
    }
}
