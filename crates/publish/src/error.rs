//! Publish error types.

use std::path::PathBuf;
use std::time::Duration;

/// Errors produced while publishing a site.
///
/// Only a missing root, invalid configuration and [`PublishError::DuplicatePath`]
/// end a run; the rest are recorded per asset in the report.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid UTF-8 in text asset {} at byte {valid_up_to}", path.display())]
    Encoding { path: PathBuf, valid_up_to: usize },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("store error {status}: {body}")]
    Store { status: u16, body: String },

    #[error("{url} is {size} bytes encoded, over the {limit} byte batch limit")]
    Oversized { url: String, size: u64, limit: u64 },

    #[error("duplicate logical URL {url}: {} and {}", first.display(), second.display())]
    DuplicatePath {
        url: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("invalid logical URL: {0}")]
    InvalidUrl(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("scan error: {0}")]
    Scan(String),

    #[error("cancelled")]
    Cancelled,

    #[error("content error: {0}")]
    Content(sitepub_content::ContentError),
}

impl From<sitepub_content::ContentError> for PublishError {
    fn from(e: sitepub_content::ContentError) -> Self {
        match e {
            sitepub_content::ContentError::InvalidUrl(url) => Self::InvalidUrl(url),
            other => Self::Content(other),
        }
    }
}
