//! Best-effort per-account quota snapshots.
//!
//! Fetch failures are never fatal: callers record the error text on the cached
//! account and carry on without a snapshot.

mod cloud_code;

pub use cloud_code::{CloudCodeUsageFetcher, generate_project_id};

use crate::credentials::OAuthCredential;
use crate::error::UsageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining quota for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelQuota {
    pub name: String,
    /// `0.0..=1.0`; absent when the upstream omits quota info for the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_fraction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
}

/// Quota view of one account at `fetched_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelQuota>,
    pub fetched_at: DateTime<Utc>,
}

#[async_trait]
pub trait UsageFetcher: Send + Sync {
    /// Short name recorded as the cached record's source label.
    fn label(&self) -> &str;

    async fn fetch(&self, credential: &OAuthCredential) -> Result<UsageSnapshot, UsageError>;
}

/// Project ids to try, in order: preferred, generated, default.
///
/// Missing or blank entries are skipped and duplicates keep their first position.
pub fn candidate_project_ids(
    preferred: Option<&str>,
    generated: Option<&str>,
    default: Option<&str>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(3);
    for id in [preferred, generated, default]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_generated_default_in_order() {
        assert_eq!(
            candidate_project_ids(Some("p"), Some("g"), Some("d")),
            vec!["p", "g", "d"]
        );
    }

    #[test]
    fn missing_preferred_is_skipped() {
        assert_eq!(
            candidate_project_ids(None, Some("g"), Some("d")),
            vec!["g", "d"]
        );
        assert_eq!(
            candidate_project_ids(Some("  "), Some("g"), Some("d")),
            vec!["g", "d"]
        );
    }

    #[test]
    fn identical_candidates_collapse_to_one() {
        assert_eq!(
            candidate_project_ids(Some("same"), Some("same"), Some("same")),
            vec!["same"]
        );
        assert_eq!(
            candidate_project_ids(Some("p"), Some("d"), Some("d")),
            vec!["p", "d"]
        );
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = UsageSnapshot {
            project_id: Some("proj".to_string()),
            tier: None,
            models: vec![ModelQuota {
                name: "gemini-2.5-pro".to_string(),
                remaining_fraction: Some(0.5),
                reset_time: None,
            }],
            fetched_at: Utc::now(),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["projectId"], "proj");
        assert_eq!(value["models"][0]["remainingFraction"], 0.5);
        assert!(value.get("tier").is_none());
        assert!(value.get("fetchedAt").is_some());
    }
}
