use reqwest::StatusCode;
use thiserror::Error as ThisError;

/// Failures of the best-effort usage-quota fetch. Never surfaced from add/refresh.
#[derive(Debug, ThisError)]
pub enum UsageError {
    #[error("usage request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("usage upstream returned status {0}")]
    UpstreamStatus(StatusCode),

    #[error("usage response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no candidate project accepted the quota request (tried {tried:?})")]
    NoProject { tried: Vec<String> },
}
