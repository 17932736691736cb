use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use castor::config::OauthConfig;
use castor::error::OauthError;
use castor::oauth::GoogleOauthEndpoints;
use chrono::Utc;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone, Default)]
struct CaptureState {
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

async fn token_handler(
    State(state): State<CaptureState>,
    body: axum::body::Bytes,
) -> (StatusCode, Json<Value>) {
    let form: HashMap<String, String> = url::form_urlencoded::parse(&body).into_owned().collect();
    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    let code = form.get("code").cloned().unwrap_or_default();
    state.forms.lock().unwrap().push(form);

    match grant_type.as_str() {
        "authorization_code" if code == "bad-code" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        ),
        "authorization_code" => (
            StatusCode::OK,
            Json(json!({
                "access_token": "access-from-code",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh-from-code"
            })),
        ),
        "refresh_token" => (
            StatusCode::OK,
            Json(json!({
                "access_token": "access-from-refresh",
                "token_type": "bearer",
                "expires_in": 1800
            })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "unsupported_grant_type" })),
        ),
    }
}

async fn userinfo_handler(
    State(state): State<CaptureState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.auth_headers.lock().unwrap().push(auth.clone());

    match auth.as_str() {
        "Bearer good-token" => (
            StatusCode::OK,
            Json(json!({ "email": "Someone@Example.com", "verified_email": true })),
        ),
        "Bearer no-email" => (StatusCode::OK, Json(json!({ "id": "123" }))),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_token" })),
        ),
    }
}

async fn spawn_google(state: CaptureState) -> OauthConfig {
    let app = Router::new()
        .route("/token", post(token_handler))
        .route("/userinfo", get(userinfo_handler))
        .with_state(state);
    let base = spawn_test_server(app).await;

    OauthConfig {
        token_url: base.join("/token").unwrap(),
        userinfo_url: base.join("/userinfo").unwrap(),
        client_id: "test-client".to_string(),
        client_secret: Some("test-secret".to_string()),
        ..OauthConfig::default()
    }
}

#[tokio::test]
async fn code_exchange_posts_form_and_returns_refresh_token() {
    let state = CaptureState::default();
    let cfg = spawn_google(state.clone()).await;
    let redirect = Url::parse("http://127.0.0.1:45678/oauth-callback").unwrap();
    let before = Utc::now();

    let grant = GoogleOauthEndpoints::exchange_authorization_code(
        &cfg,
        &redirect,
        "auth-code-1",
        &reqwest::Client::new(),
    )
    .await
    .expect("exchange succeeds");

    assert_eq!(grant.access_token, "access-from-code");
    assert_eq!(grant.refresh_token.as_deref(), Some("refresh-from-code"));
    assert!(grant.expires_at >= before + chrono::Duration::seconds(3590));

    let forms = state.forms.lock().unwrap();
    assert_eq!(forms.len(), 1);
    let form = &forms[0];
    assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
    assert_eq!(form.get("code").map(String::as_str), Some("auth-code-1"));
    assert_eq!(
        form.get("redirect_uri").map(String::as_str),
        Some("http://127.0.0.1:45678/oauth-callback")
    );
    assert_eq!(form.get("client_id").map(String::as_str), Some("test-client"));
    assert_eq!(form.get("client_secret").map(String::as_str), Some("test-secret"));
}

#[tokio::test]
async fn rejected_code_surfaces_as_oauth_error() {
    let cfg = spawn_google(CaptureState::default()).await;
    let redirect = Url::parse("http://127.0.0.1:45678/oauth-callback").unwrap();

    let err = GoogleOauthEndpoints::exchange_authorization_code(
        &cfg,
        &redirect,
        "bad-code",
        &reqwest::Client::new(),
    )
    .await
    .expect_err("invalid_grant");
    assert!(err.to_string().contains("invalid_grant"), "{err}");
}

#[tokio::test]
async fn refresh_without_rotation_leaves_refresh_token_unset() {
    let state = CaptureState::default();
    let cfg = spawn_google(state.clone()).await;

    let grant =
        GoogleOauthEndpoints::refresh_access_token(&cfg, "1//stored", &reqwest::Client::new())
            .await
            .expect("refresh succeeds");

    assert_eq!(grant.access_token, "access-from-refresh");
    assert!(grant.refresh_token.is_none());

    let forms = state.forms.lock().unwrap();
    let form = &forms[0];
    assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(form.get("refresh_token").map(String::as_str), Some("1//stored"));
    assert!(!form.contains_key("redirect_uri"));
}

#[tokio::test]
async fn profile_lookup_sends_bearer_token() {
    let state = CaptureState::default();
    let cfg = spawn_google(state.clone()).await;
    let client = reqwest::Client::new();

    let email = GoogleOauthEndpoints::fetch_profile_email(&cfg, "good-token", &client)
        .await
        .expect("profile");
    assert_eq!(email, "Someone@Example.com");

    let missing = GoogleOauthEndpoints::fetch_profile_email(&cfg, "no-email", &client)
        .await
        .expect("profile without email");
    assert!(missing.is_empty());

    let err = GoogleOauthEndpoints::fetch_profile_email(&cfg, "expired", &client)
        .await
        .expect_err("unauthorized");
    assert!(matches!(err, OauthError::UpstreamStatus(s) if s.as_u16() == 401));

    let headers = state.auth_headers.lock().unwrap();
    assert_eq!(
        *headers,
        ["Bearer good-token", "Bearer no-email", "Bearer expired"]
    );
}
