use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use castor::injector::{
    ForeignStateDb, LEGACY_STATE_KEY, ONBOARDING_KEY, SchemaWrite, StateInjector,
    UNIFIED_TOKEN_KEY, legacy_email, oauth_token_message, unified_value,
};
use castor::probe::{StatusProbe, StoreStatusProbe};
use castor::{CastorError, OAuthCredential};
use castor_wire::{Fields, MessageBuilder};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn credential(email: &str) -> OAuthCredential {
    OAuthCredential {
        email: email.to_string(),
        access_token: "ya29.new".to_string(),
        refresh_token: "1//new".to_string(),
        expiry: Utc::now() + Duration::hours(1),
        updated_at: Utc::now(),
    }
}

async fn raw_pool(path: &Path) -> SqlitePool {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("open raw sqlite")
}

/// A state database shaped like the foreign application's, optionally seeded.
async fn state_db(dir: &Path, seed: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("state.vscdb");
    let pool = raw_pool(&path).await;
    sqlx::query("CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)")
        .execute(&pool)
        .await
        .unwrap();
    for (key, value) in seed {
        sqlx::query("INSERT INTO ItemTable (key, value) VALUES (?, ?)")
            .bind(*key)
            .bind(*value)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
    path
}

async fn read(path: &Path, key: &str) -> Option<String> {
    let db = ForeignStateDb::open(path).await.unwrap();
    let value = db.get(key).await.unwrap();
    db.close().await;
    value
}

fn legacy_seed() -> String {
    let existing = MessageBuilder::new()
        .string(2, "old@example.com")
        .string(3, "workspace-settings")
        .bytes(6, b"stale-token")
        .varint(11, 7)
        .finish();
    STANDARD.encode(existing)
}

#[tokio::test]
async fn writes_both_schemas_and_preserves_unrelated_legacy_fields() {
    let dir = TempDir::new().unwrap();
    let seed = legacy_seed();
    let path = state_db(
        dir.path(),
        &[(LEGACY_STATE_KEY, seed.as_str()), ("unrelated.key", "untouched")],
    )
    .await;
    let cred = credential("new@example.com");

    let report = StateInjector.inject(&path, &cred).await.expect("inject");
    assert_eq!(report.unified, SchemaWrite::Written);
    assert_eq!(report.legacy, SchemaWrite::Written);
    assert!(report.onboarding_flagged);

    assert_eq!(read(&path, UNIFIED_TOKEN_KEY).await, Some(unified_value(&cred)));
    assert_eq!(read(&path, ONBOARDING_KEY).await.as_deref(), Some("true"));
    assert_eq!(read(&path, "unrelated.key").await.as_deref(), Some("untouched"));

    let legacy = read(&path, LEGACY_STATE_KEY).await.unwrap();
    assert_eq!(legacy_email(&legacy).unwrap().as_deref(), Some("new@example.com"));

    let bytes = STANDARD.decode(legacy).unwrap();
    let fields: Vec<(u32, Vec<u8>)> = Fields::new(&bytes)
        .map(|f| {
            let f = f.unwrap();
            (f.number, f.payload.to_vec())
        })
        .collect();
    let numbers: Vec<u32> = fields.iter().map(|(n, _)| *n).collect();
    assert_eq!(numbers, [3, 11, 2, 6]);
    assert_eq!(fields[0].1, b"workspace-settings");
    assert_eq!(fields[3].1, oauth_token_message(&cred).finish());
}

#[tokio::test]
async fn missing_legacy_value_is_skipped_not_created() {
    let dir = TempDir::new().unwrap();
    let path = state_db(dir.path(), &[]).await;

    let report = StateInjector
        .inject(&path, &credential("a@example.com"))
        .await
        .expect("inject");
    assert_eq!(report.unified, SchemaWrite::Written);
    assert_eq!(report.legacy, SchemaWrite::Skipped);
    assert!(read(&path, LEGACY_STATE_KEY).await.is_none());
}

#[tokio::test]
async fn corrupt_legacy_value_does_not_block_unified_write() {
    let dir = TempDir::new().unwrap();
    let path = state_db(dir.path(), &[(LEGACY_STATE_KEY, "%%% not base64 %%%")]).await;

    let report = StateInjector
        .inject(&path, &credential("a@example.com"))
        .await
        .expect("inject");
    assert_eq!(report.unified, SchemaWrite::Written);
    assert!(matches!(report.legacy, SchemaWrite::Failed(_)));
    assert_eq!(
        read(&path, LEGACY_STATE_KEY).await.as_deref(),
        Some("%%% not base64 %%%")
    );
}

#[tokio::test]
async fn missing_database_is_not_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.vscdb");

    let err = StateInjector
        .inject(&path, &credential("a@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, CastorError::DatabaseNotFound));
    assert!(!path.exists());
}

#[tokio::test]
async fn database_without_item_table_fails_both_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.vscdb");
    let pool = raw_pool(&path).await;
    sqlx::query("CREATE TABLE Other (id INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let err = StateInjector
        .inject(&path, &credential("a@example.com"))
        .await
        .unwrap_err();
    match err {
        CastorError::DatabaseWriteFailed(detail) => {
            assert!(detail.contains("unified:"), "{detail}");
            assert!(detail.contains("legacy:"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn status_probe_reports_injected_identity() {
    let dir = TempDir::new().unwrap();
    let seed = legacy_seed();
    let path = state_db(dir.path(), &[(LEGACY_STATE_KEY, seed.as_str())]).await;
    let probe = StoreStatusProbe::new(&path);

    assert_eq!(
        probe.active_identity().await.unwrap().as_deref(),
        Some("old@example.com")
    );

    StateInjector
        .inject(&path, &credential("New@Example.com"))
        .await
        .unwrap();
    assert_eq!(
        probe.active_identity().await.unwrap().as_deref(),
        Some("new@example.com")
    );
}

#[tokio::test]
async fn status_probe_without_legacy_value_reports_none() {
    let dir = TempDir::new().unwrap();
    let path = state_db(dir.path(), &[]).await;
    let probe = StoreStatusProbe::new(&path);
    assert_eq!(probe.active_identity().await.unwrap(), None);
}
