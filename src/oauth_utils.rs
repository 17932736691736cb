use crate::error::CastorError;
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthUrl, Client as OAuth2Client, ClientId, ClientSecret, ExtraTokenFields,
    RedirectUrl, StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Extra (non-standard) OAuth token response fields.
///
/// Google returns an OpenID `id_token` alongside the access token; anything else is kept
/// via `flatten`. Debug output is redacted.
#[derive(Clone, Deserialize, Serialize)]
pub(crate) struct GoogleTokenFields {
    pub id_token: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ExtraTokenFields for GoogleTokenFields {}

impl std::fmt::Debug for GoogleTokenFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.extra.keys().collect();
        keys.sort();

        f.debug_struct("GoogleTokenFields")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("extra_keys", &keys)
            .finish()
    }
}

/// Token endpoint response extended with [`GoogleTokenFields`].
pub(crate) type OauthTokenResponse = StandardTokenResponse<GoogleTokenFields, BasicTokenType>;

/// An OAuth2 client with auth + token endpoints set, returning [`OauthTokenResponse`].
pub(crate) type GoogleOauth2Client<
    HasAuthUrl = oauth2::EndpointSet,
    HasDeviceAuthUrl = oauth2::EndpointNotSet,
    HasIntrospectionUrl = oauth2::EndpointNotSet,
    HasRevocationUrl = oauth2::EndpointNotSet,
    HasTokenUrl = oauth2::EndpointSet,
> = OAuth2Client<
    BasicErrorResponse,
    OauthTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    HasAuthUrl,
    HasDeviceAuthUrl,
    HasIntrospectionUrl,
    HasRevocationUrl,
    HasTokenUrl,
>;

/// Build a client for `authorization_code` + `refresh_token` grants.
///
/// Client credentials travel in the form body (`client_id`, optional `client_secret`),
/// not in a Basic auth header.
pub(crate) fn build_oauth2_client(
    client_id: &str,
    client_secret: Option<&str>,
    auth_url: &str,
    token_url: &str,
    redirect_url: Option<RedirectUrl>,
) -> Result<GoogleOauth2Client, CastorError> {
    let mut client = OAuth2Client::<
        BasicErrorResponse,
        OauthTokenResponse,
        BasicTokenIntrospectionResponse,
        StandardRevocableToken,
        BasicRevocationErrorResponse,
    >::new(ClientId::new(client_id.to_string()))
    .set_auth_type(AuthType::RequestBody);

    if let Some(secret) = client_secret.filter(|s| !s.is_empty()) {
        client = client.set_client_secret(ClientSecret::new(secret.to_string()));
    }

    let mut client = client
        .set_auth_uri(AuthUrl::new(auth_url.to_string())?)
        .set_token_uri(TokenUrl::new(token_url.to_string())?);

    if let Some(redirect) = redirect_url {
        client = client.set_redirect_uri(redirect);
    }

    Ok(client)
}
