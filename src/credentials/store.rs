use super::models::OAuthCredential;
use super::schema::SQLITE_INIT;
use crate::error::CastorError;
use crate::utils::fs::{restrict_permissions, to_sorted_json, write_atomic};
use crate::utils::identity::normalize_identity;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Credential rows in SQLite plus a JSON set of tombstoned identities.
///
/// A tombstoned identity is hidden from every read until it is upserted again;
/// its row stays in the database.
pub struct CredentialStore {
    pool: SqlitePool,
    tombstone_path: PathBuf,
    tombstones: Mutex<BTreeSet<String>>,
}

impl CredentialStore {
    /// Open (creating if missing) the credential database and load the tombstone set.
    pub async fn open(
        db_path: &Path,
        tombstone_path: impl Into<PathBuf>,
    ) -> Result<Self, CastorError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;
        restrict_permissions(db_path).await?;
        apply_schema(&pool).await?;

        let tombstone_path = tombstone_path.into();
        let tombstones = load_tombstones(&tombstone_path).await?;

        info!(
            path = %db_path.display(),
            tombstoned = tombstones.len(),
            "Credential store opened"
        );
        Ok(Self {
            pool,
            tombstone_path,
            tombstones: Mutex::new(tombstones),
        })
    }

    /// Insert or replace the credential for its (normalized) identity and revive it if tombstoned.
    pub async fn upsert(&self, credential: OAuthCredential) -> Result<OAuthCredential, CastorError> {
        let email =
            normalize_identity(&credential.email).ok_or(CastorError::AccountEmailUnavailable)?;
        let refresh_token = credential.refresh_token.trim().to_string();
        if refresh_token.is_empty() {
            return Err(CastorError::RefreshTokenMissing);
        }

        let now = Utc::now();
        let stored: OAuthCredential = sqlx::query_as(
            r#"
            INSERT INTO accounts (email, access_token, refresh_token, expiry, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expiry = excluded.expiry,
                updated_at = excluded.updated_at
            RETURNING email, access_token, refresh_token, expiry, updated_at
            "#,
        )
        .bind(&email)
        .bind(&credential.access_token)
        .bind(&refresh_token)
        .bind(credential.expiry)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let mut tombstones = self.tombstones.lock().await;
        if tombstones.contains(&email) {
            let mut next = tombstones.clone();
            next.remove(&email);
            persist_tombstones(&self.tombstone_path, &next).await?;
            *tombstones = next;
            info!(identity = %email, "Tombstone cleared by upsert");
        }
        debug!(identity = %email, expiry = %stored.expiry, "Credential upserted");
        Ok(stored)
    }

    /// Tombstone an identity. The row is kept so a later upsert simply revives it.
    pub async fn remove(&self, identity: &str) -> Result<(), CastorError> {
        let email = normalize_identity(identity).ok_or(CastorError::AccountEmailUnavailable)?;
        let mut tombstones = self.tombstones.lock().await;
        if !tombstones.contains(&email) {
            let mut next = tombstones.clone();
            next.insert(email.clone());
            persist_tombstones(&self.tombstone_path, &next).await?;
            *tombstones = next;
        }
        info!(identity = %email, "Credential tombstoned");
        Ok(())
    }

    pub async fn is_tombstoned(&self, identity: &str) -> bool {
        let Some(email) = normalize_identity(identity) else {
            return false;
        };
        self.tombstones.lock().await.contains(&email)
    }

    /// The live credential for `identity`; `None` when never added or tombstoned.
    pub async fn credential(&self, identity: &str) -> Result<Option<OAuthCredential>, CastorError> {
        let Some(email) = normalize_identity(identity) else {
            return Ok(None);
        };
        if self.tombstones.lock().await.contains(&email) {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, OAuthCredential>(
            r#"
            SELECT email, access_token, refresh_token, expiry, updated_at
            FROM accounts
            WHERE email = ?
            "#,
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Every non-tombstoned credential, ordered by identity.
    pub async fn all_credentials(&self) -> Result<Vec<OAuthCredential>, CastorError> {
        let rows = sqlx::query_as::<_, OAuthCredential>(
            r#"
            SELECT email, access_token, refresh_token, expiry, updated_at
            FROM accounts
            ORDER BY email ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let tombstones = self.tombstones.lock().await;
        Ok(rows
            .into_iter()
            .filter(|c| !tombstones.contains(&c.email))
            .collect())
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), CastorError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}

async fn load_tombstones(path: &Path) -> Result<BTreeSet<String>, CastorError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(e.into()),
    };
    let identities: Vec<String> = serde_json::from_slice(&bytes)?;
    Ok(identities
        .iter()
        .filter_map(|i| normalize_identity(i))
        .collect())
}

async fn persist_tombstones(path: &Path, tombstones: &BTreeSet<String>) -> Result<(), CastorError> {
    // BTreeSet serializes as an already-sorted array.
    let bytes = to_sorted_json(tombstones)?;
    write_atomic(path, &bytes).await?;
    Ok(())
}
