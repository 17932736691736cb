//! Credential injection into the foreign application's state database.

mod payload;
mod state_db;

pub use payload::{
    LEGACY_STATE_KEY, ONBOARDING_KEY, UNIFIED_TOKEN_KEY, legacy_email, merge_legacy_value,
    oauth_token_message, unified_value,
};
pub use state_db::ForeignStateDb;

use crate::credentials::OAuthCredential;
use crate::error::CastorError;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of one schema write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWrite {
    Written,
    /// Nothing to merge into (legacy key absent or empty).
    Skipped,
    Failed(String),
}

impl SchemaWrite {
    pub fn is_written(&self) -> bool {
        matches!(self, SchemaWrite::Written)
    }
}

impl fmt::Display for SchemaWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWrite::Written => f.write_str("written"),
            SchemaWrite::Skipped => f.write_str("skipped (no existing value)"),
            SchemaWrite::Failed(e) => f.write_str(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionReport {
    pub unified: SchemaWrite,
    pub legacy: SchemaWrite,
    pub onboarding_flagged: bool,
}

/// Writes a credential into both token schemas of the foreign store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateInjector;

impl StateInjector {
    /// Succeeds when at least one schema was written; otherwise `DatabaseWriteFailed`
    /// carrying both outcomes.
    pub async fn inject(
        &self,
        db_path: &Path,
        credential: &OAuthCredential,
    ) -> Result<InjectionReport, CastorError> {
        let db = ForeignStateDb::open(db_path).await?;
        let report = self.inject_into(&db, credential).await;
        db.close().await;

        let report = report?;
        info!(
            identity = %credential.email,
            path = %db_path.display(),
            unified = %report.unified,
            legacy = %report.legacy,
            "Credential injected into foreign state store"
        );
        Ok(report)
    }

    async fn inject_into(
        &self,
        db: &ForeignStateDb,
        credential: &OAuthCredential,
    ) -> Result<InjectionReport, CastorError> {
        let unified = match db.put(UNIFIED_TOKEN_KEY, &unified_value(credential)).await {
            Ok(()) => SchemaWrite::Written,
            Err(e) => {
                warn!(error = %e, "Unified token write failed");
                SchemaWrite::Failed(e.to_string())
            }
        };

        let legacy = self.write_legacy(db, credential).await;

        if !unified.is_written() && !legacy.is_written() {
            return Err(CastorError::DatabaseWriteFailed(format!(
                "unified: {unified}; legacy: {legacy}"
            )));
        }

        let onboarding_flagged = match db.put(ONBOARDING_KEY, "true").await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Onboarding flag write failed");
                false
            }
        };

        Ok(InjectionReport {
            unified,
            legacy,
            onboarding_flagged,
        })
    }

    async fn write_legacy(&self, db: &ForeignStateDb, credential: &OAuthCredential) -> SchemaWrite {
        let existing = match db.get(LEGACY_STATE_KEY).await {
            Ok(Some(value)) if !value.trim().is_empty() => value,
            Ok(_) => {
                debug!("No legacy state value; skipping legacy write");
                return SchemaWrite::Skipped;
            }
            Err(e) => {
                warn!(error = %e, "Legacy state read failed");
                return SchemaWrite::Failed(e.to_string());
            }
        };

        let merged = match merge_legacy_value(&existing, credential) {
            Ok(merged) => merged,
            Err(e) => {
                warn!(error = %e, "Legacy state value could not be rewritten");
                return SchemaWrite::Failed(e.to_string());
            }
        };

        match db.put(LEGACY_STATE_KEY, &merged).await {
            Ok(()) => SchemaWrite::Written,
            Err(e) => {
                warn!(error = %e, "Legacy state write failed");
                SchemaWrite::Failed(e.to_string())
            }
        }
    }
}
