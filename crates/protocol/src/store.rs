use serde::{Deserialize, Serialize};

/// Body of `POST {endpoint}/storage/store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRequest {
    /// UTF-8 text, or base64 for binary assets.
    pub data: String,
    pub metadata: StoreMetadata,
}

/// Descriptive metadata attached to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub filename: String,
    /// Logical URL of the asset.
    pub path: String,
    /// Raw size in bytes, before encoding.
    pub size: u64,
}

/// Successful store response.
///
/// Deployed store versions disagree on the field name, so every known
/// spelling is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(
        default,
        rename = "contentHash",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_hash_camel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

impl StoreResponse {
    /// Returns the first non-empty identifier, in order of preference.
    pub fn identifier(&self) -> Option<&str> {
        [
            &self.hash,
            &self.content_hash,
            &self.content_hash_camel,
            &self.cid,
        ]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())
    }
}
