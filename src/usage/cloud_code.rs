use super::{ModelQuota, UsageFetcher, UsageSnapshot, candidate_project_ids};
use crate::config::UsageConfig;
use crate::credentials::OAuthCredential;
use crate::error::UsageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use rand::seq::IndexedRandom;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The foreign application's own user agent; the quota endpoints gate on it.
const CLOUD_CODE_USER_AGENT: &str = "antigravity/1.15.8 (Windows; AMD64)";

const ADJECTIVES: &[&str] = &[
    "useful", "bright", "swift", "calm", "bold", "noble", "quiet", "steady", "vivid", "brisk",
];
const NOUNS: &[&str] = &[
    "fuze", "wave", "spark", "flow", "core", "atlas", "harbor", "signal", "summit", "meadow",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientMetadata {
    ide_type: &'static str,
    platform: &'static str,
    plugin_type: &'static str,
}

impl Default for ClientMetadata {
    fn default() -> Self {
        Self {
            ide_type: "ANTIGRAVITY",
            platform: "PLATFORM_UNSPECIFIED",
            plugin_type: "GEMINI",
        }
    }
}

#[derive(Debug, Serialize)]
struct LoadCodeAssistRequest {
    metadata: ClientMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadCodeAssistResponse {
    #[serde(default)]
    cloudaicompanion_project: Option<ProjectIdOrObject>,
    #[serde(default)]
    current_tier: Option<TierInfo>,
    #[serde(default)]
    paid_tier: Option<TierInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProjectIdOrObject {
    String(String),
    Object { id: String },
}

impl ProjectIdOrObject {
    fn into_id(self) -> Option<String> {
        match self {
            ProjectIdOrObject::String(s) if !s.trim().is_empty() => Some(s),
            ProjectIdOrObject::Object { id } if !id.trim().is_empty() => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TierInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TierInfo {
    fn label(self) -> Option<String> {
        self.name.or(self.id).filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
struct FetchModelsRequest<'a> {
    project: &'a str,
}

#[derive(Debug, Deserialize)]
struct FetchModelsResponse {
    #[serde(default)]
    models: BTreeMap<String, ModelEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    #[serde(default)]
    quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotaInfo {
    #[serde(default)]
    remaining_fraction: Option<f64>,
    #[serde(default)]
    reset_time: Option<DateTime<Utc>>,
}

/// A throwaway project id in the `adjective-noun-xxxxx` shape the upstream hands out.
pub fn generate_project_id() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("useful");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("fuze");
    let suffix: String = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(5)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{adjective}-{noun}-{suffix}")
}

/// Quota snapshots from the cloud code `fetchAvailableModels` endpoint.
pub struct CloudCodeUsageFetcher {
    cfg: UsageConfig,
    http_client: reqwest::Client,
}

impl CloudCodeUsageFetcher {
    pub fn new(cfg: UsageConfig, http_client: reqwest::Client) -> Self {
        Self { cfg, http_client }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1internal:{method}",
            self.cfg.api_url.as_str().trim_end_matches('/')
        )
    }

    async fn load_code_assist(
        &self,
        access_token: &str,
    ) -> Result<LoadCodeAssistResponse, UsageError> {
        let resp = self
            .http_client
            .post(self.endpoint("loadCodeAssist"))
            .bearer_auth(access_token)
            .header(USER_AGENT, CLOUD_CODE_USER_AGENT)
            .json(&LoadCodeAssistRequest {
                metadata: ClientMetadata::default(),
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(UsageError::UpstreamStatus(resp.status()));
        }
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_models(
        &self,
        access_token: &str,
        project_id: &str,
    ) -> Result<Vec<ModelQuota>, UsageError> {
        let resp = self
            .http_client
            .post(self.endpoint("fetchAvailableModels"))
            .bearer_auth(access_token)
            .header(USER_AGENT, CLOUD_CODE_USER_AGENT)
            .json(&FetchModelsRequest {
                project: project_id,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(UsageError::UpstreamStatus(resp.status()));
        }
        let body = resp.bytes().await?;
        let parsed: FetchModelsResponse = serde_json::from_slice(&body)?;

        Ok(parsed
            .models
            .into_iter()
            .map(|(name, entry)| {
                let quota = entry.quota_info;
                ModelQuota {
                    name,
                    remaining_fraction: quota.as_ref().and_then(|q| q.remaining_fraction),
                    reset_time: quota.and_then(|q| q.reset_time),
                }
            })
            .collect())
    }
}

#[async_trait]
impl UsageFetcher for CloudCodeUsageFetcher {
    fn label(&self) -> &str {
        "cloud-code"
    }

    async fn fetch(&self, credential: &OAuthCredential) -> Result<UsageSnapshot, UsageError> {
        let access_token = credential.access_token.as_str();

        let discovery = match self.load_code_assist(access_token).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(identity = %credential.email, error = %e, "loadCodeAssist failed; falling back to generated project ids");
                LoadCodeAssistResponse::default()
            }
        };
        let preferred = discovery
            .cloudaicompanion_project
            .and_then(ProjectIdOrObject::into_id);
        let tier = discovery
            .paid_tier
            .and_then(TierInfo::label)
            .or_else(|| discovery.current_tier.and_then(TierInfo::label));

        let generated = generate_project_id();
        let candidates = candidate_project_ids(
            preferred.as_deref(),
            Some(&generated),
            Some(&self.cfg.default_project_id),
        );

        for project_id in &candidates {
            match self.fetch_models(access_token, project_id).await {
                Ok(models) => {
                    debug!(
                        identity = %credential.email,
                        project_id = %project_id,
                        models = models.len(),
                        "Usage snapshot fetched"
                    );
                    return Ok(UsageSnapshot {
                        project_id: Some(project_id.clone()),
                        tier,
                        models,
                        fetched_at: Utc::now(),
                    });
                }
                Err(e) => {
                    debug!(identity = %credential.email, project_id = %project_id, error = %e, "fetchAvailableModels rejected project");
                }
            }
        }

        Err(UsageError::NoProject { tried: candidates })
    }
}
