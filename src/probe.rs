//! Observing which account the foreign application currently reports.

use crate::error::CastorError;
use crate::injector::{ForeignStateDb, LEGACY_STATE_KEY, legacy_email};
use crate::utils::identity::normalize_identity;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Normalized identity the foreign application is signed in as, if any.
    async fn active_identity(&self) -> Result<Option<String>, CastorError>;
}

/// Reads the email the foreign application last persisted in its legacy state record.
pub struct StoreStatusProbe {
    db_path: PathBuf,
}

impl StoreStatusProbe {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

#[async_trait]
impl StatusProbe for StoreStatusProbe {
    async fn active_identity(&self) -> Result<Option<String>, CastorError> {
        let db = ForeignStateDb::open(&self.db_path).await?;
        let value = db.get(LEGACY_STATE_KEY).await;
        db.close().await;

        match value? {
            Some(value) if !value.trim().is_empty() => {
                Ok(legacy_email(&value)?.and_then(|email| normalize_identity(&email)))
            }
            _ => Ok(None),
        }
    }
}
