use super::slot::ResultSlot;
use crate::error::CastorError;
use axum::{
    Router,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const CALLBACK_PATH: &str = "/oauth-callback";

const SUCCESS_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>Signed in</title></head>\
<body><h1>Authentication successful</h1><p>You may close this window.</p></body></html>";
const FAILURE_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>Sign-in failed</title></head>\
<body><h1>Authentication failed</h1><p>You may close this window and retry.</p></body></html>";
const NOT_FOUND_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\"><title>Not found</title></head>\
<body><h1>Not found</h1></body></html>";

/// Query parameters carried by the authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    pub code: String,
    /// Empty when the provider omitted it; the caller treats that as a mismatch.
    pub state: String,
}

type CallbackResult = Result<CallbackPayload, CastorError>;

#[derive(Clone)]
struct CallbackState {
    slot: Arc<ResultSlot<CallbackResult>>,
    shutdown: CancellationToken,
}

/// Single-use localhost listener for the OAuth redirect.
///
/// The listener task stops as soon as one result is delivered, or when the server is dropped.
pub struct OAuthCallbackServer {
    redirect_uri: Url,
    slot: Arc<ResultSlot<CallbackResult>>,
    shutdown: CancellationToken,
}

impl OAuthCallbackServer {
    /// Bind `127.0.0.1:0` and start serving [`CALLBACK_PATH`] on a background task.
    pub async fn start() -> Result<Self, CastorError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| CastorError::ListenerStartFailed(e.to_string()))?;
        let port = listener
            .local_addr()
            .map_err(|e| CastorError::ListenerStartFailed(e.to_string()))?
            .port();
        let redirect_uri = Url::parse(&format!("http://127.0.0.1:{port}{CALLBACK_PATH}"))?;

        let slot = Arc::new(ResultSlot::new());
        let shutdown = CancellationToken::new();
        let app = Router::new()
            .route(CALLBACK_PATH, get(oauth_callback))
            .fallback(not_found)
            .with_state(CallbackState {
                slot: slot.clone(),
                shutdown: shutdown.clone(),
            });

        let stop = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                warn!(error = %e, "OAuth callback listener exited with error");
            }
            debug!(port, "OAuth callback listener stopped");
        });

        info!(port, "OAuth callback listener started");
        Ok(Self {
            redirect_uri,
            slot,
            shutdown,
        })
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Wait for the redirect, the timeout, or cancellation, whichever resolves the slot first.
    ///
    /// Consumes the server; the listener is shut down on return.
    pub async fn wait_for_callback(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CallbackPayload, CastorError> {
        let waiter = self.slot.wait();
        tokio::pin!(waiter);

        let interrupted = tokio::select! {
            delivered = &mut waiter => {
                return delivered.unwrap_or(Err(CastorError::Cancelled));
            }
            () = tokio::time::sleep(timeout) => CastorError::TimedOut,
            () = cancel.cancelled() => CastorError::Cancelled,
        };

        // A redirect may have won the race in the meantime; the slot keeps whichever came first.
        if !self.slot.resolve(Err(interrupted)) {
            debug!("OAuth callback arrived while the wait was being interrupted");
        }
        waiter.await.unwrap_or(Err(CastorError::Cancelled))
    }
}

impl Drop for OAuthCallbackServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn oauth_callback(State(state): State<CallbackState>, RawQuery(query): RawQuery) -> Response {
    let parsed = parse_callback_query(query.as_deref().unwrap_or_default());
    let response = match &parsed {
        Ok(_) => (StatusCode::OK, Html(SUCCESS_HTML)).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, Html(FAILURE_HTML)).into_response(),
    };

    if state.slot.resolve(parsed) {
        state.shutdown.cancel();
    } else {
        debug!("Ignoring OAuth callback after the result was already delivered");
    }
    response
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML))
}

fn parse_callback_query(query: &str) -> CallbackResult {
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        warn!(
            error = %error,
            description = %params.get("error_description").map(String::as_str).unwrap_or(""),
            "OAuth provider redirected with an error"
        );
        return Err(CastorError::CodeMissing);
    }

    let code = params
        .get("code")
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .ok_or(CastorError::CodeMissing)?;
    let state = params
        .get("state")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    Ok(CallbackPayload {
        code: code.to_string(),
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_and_state() {
        let payload = parse_callback_query("code=4%2F0Abc&state=nonce-1&scope=email").unwrap();
        assert_eq!(payload.code, "4/0Abc");
        assert_eq!(payload.state, "nonce-1");
    }

    #[test]
    fn missing_or_blank_code_is_code_missing() {
        assert!(matches!(
            parse_callback_query("state=x"),
            Err(CastorError::CodeMissing)
        ));
        assert!(matches!(
            parse_callback_query("code=%20%20&state=x"),
            Err(CastorError::CodeMissing)
        ));
        assert!(matches!(parse_callback_query(""), Err(CastorError::CodeMissing)));
    }

    #[test]
    fn provider_error_redirect_is_rejected_even_with_code() {
        assert!(matches!(
            parse_callback_query("error=access_denied&code=abc"),
            Err(CastorError::CodeMissing)
        ));
    }

    #[tokio::test]
    async fn redirect_uri_points_at_bound_port() {
        let server = OAuthCallbackServer::start().await.unwrap();
        let uri = server.redirect_uri().clone();
        assert_eq!(uri.host_str(), Some("127.0.0.1"));
        assert_eq!(uri.path(), CALLBACK_PATH);
        assert!(uri.port().is_some_and(|p| p != 0));
    }
}
