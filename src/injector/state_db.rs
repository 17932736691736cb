use crate::error::CastorError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Connection to the foreign application's `ItemTable` key/value store.
///
/// Never creates the database; the foreign application owns its schema.
pub struct ForeignStateDb {
    pool: SqlitePool,
}

impl ForeignStateDb {
    pub async fn open(path: &Path) -> Result<Self, CastorError> {
        if !path.is_file() {
            return Err(CastorError::DatabaseNotFound);
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await
            .map_err(|e| CastorError::DatabaseOpenFailed(format!("{}: {e}", path.display())))?;

        Ok(Self { pool })
    }

    /// Value stored under `key`, read as text.
    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT CAST(value AS TEXT) FROM ItemTable WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten())
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
