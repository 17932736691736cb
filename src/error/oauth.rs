use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use reqwest::StatusCode;
use thiserror::Error as ThisError;

/// Transport/protocol failures talking to the OAuth token and profile endpoints.
#[derive(Debug, ThisError)]
pub enum OauthError {
    #[error("OAuth2 request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OAuth2 upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("OAuth2 server response error: {error}")]
    ServerResponse { error: String },

    #[error("OAuth2 endpoint parse error: {message}. Body: {body}")]
    Parse { message: String, body: String },

    #[error("OAuth2 unexpected error: {message}")]
    Other { message: String },
}

type PkgsRequestTokenError = RequestTokenError<
    HttpClientError<ReqwestClientError>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

impl From<PkgsRequestTokenError> for OauthError {
    fn from(e: PkgsRequestTokenError) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => OauthError::ServerResponse {
                error: err.error().to_string(),
            },
            RequestTokenError::Request(wrapper) => match wrapper {
                oauth2::HttpClientError::Reqwest(real_err) => OauthError::Request(*real_err),
                other => OauthError::Other {
                    message: format!("HttpClientError: {other:?}"),
                },
            },
            RequestTokenError::Parse(parse_err, body) => OauthError::Parse {
                message: parse_err.to_string(),
                body: preview(&body),
            },
            RequestTokenError::Other(s) => OauthError::Other { message: s },
        }
    }
}

/// First 100 characters of a response body, for error messages.
pub(crate) fn preview(body: &[u8]) -> String {
    let body_str = String::from_utf8_lossy(body);
    body_str
        .char_indices()
        .nth(100)
        .map(|(idx, _)| format!("{}...<truncated>", &body_str[..idx]))
        .unwrap_or_else(|| body_str.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_bodies() {
        let body = "x".repeat(150);
        let out = preview(body.as_bytes());
        assert!(out.starts_with(&"x".repeat(100)));
        assert!(out.ends_with("...<truncated>"));
    }

    #[test]
    fn preview_keeps_short_bodies() {
        assert_eq!(preview(b"{\"error\":\"bad\"}"), "{\"error\":\"bad\"}");
    }
}
