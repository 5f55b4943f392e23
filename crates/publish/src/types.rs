//! Data types for the publish flow.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sitepub_content::{ContentHash, Payload};
use sitepub_protocol::{DescriptorTotals, RegistrationDescriptor};

use crate::descriptor::RegistrationChunk;

/// A file found by the scanner. Bytes are not read yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub source_path: PathBuf,
    /// Path relative to the root, `/`-separated.
    pub relative_path: String,
    pub logical_url: String,
}

/// A classified, hashed and encoded asset.
///
/// Created once by [`Classifier::load`](crate::Classifier::load) and shared
/// read-only by the batcher and uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAsset {
    pub source_path: PathBuf,
    pub relative_path: String,
    pub logical_url: String,
    pub content_type: String,
    pub is_binary: bool,
    /// Priority bucket; 0 is published first.
    pub tier: u8,
    /// Raw size in bytes.
    pub size: u64,
    /// Hash of the raw bytes.
    pub hash: ContentHash,
    pub payload: Payload,
}

impl SiteAsset {
    /// Size of the encoded payload in bytes.
    pub fn encoded_len(&self) -> u64 {
        self.payload.encoded_len()
    }

    /// File name sent in store metadata.
    pub fn filename(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// How an asset appears in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Content inlined in the descriptor.
    Embed,
    /// Uploaded to the store and referenced by hash.
    Reference,
}

/// Where the published hash of an asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadSource {
    /// Identifier returned by the store.
    Remote,
    /// Identifier recorded by an earlier successful run.
    Cached,
    /// The store could not confirm; the local hash is used.
    LocalFallback,
}

/// Outcome of publishing one asset to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Hash written into the descriptor.
    pub hash: String,
    /// Hash computed from the raw bytes.
    pub local_hash: ContentHash,
    pub succeeded: bool,
    pub source: UploadSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResult {
    pub fn remote(hash: String, local_hash: ContentHash) -> Self {
        Self {
            hash,
            local_hash,
            succeeded: true,
            source: UploadSource::Remote,
            error: None,
        }
    }

    pub fn cached(hash: String, local_hash: ContentHash) -> Self {
        Self {
            hash,
            local_hash,
            succeeded: true,
            source: UploadSource::Cached,
            error: None,
        }
    }

    pub fn fallback(local_hash: ContentHash, error: String) -> Self {
        Self {
            hash: local_hash.to_string(),
            local_hash,
            succeeded: false,
            source: UploadSource::LocalFallback,
            error: Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == UploadSource::LocalFallback
    }
}

/// Category of a per-asset problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The file vanished between scan and read.
    NotFound,
    /// The file or directory exists but could not be read.
    Unreadable,
    /// Text asset that is not valid UTF-8; skipped.
    Encoding,
    /// Larger than one batch; referenced instead of batched.
    Oversized,
    /// Dropped by an exclusion rule.
    Excluded,
    /// Published under the local hash.
    Degraded,
    /// Upload still outstanding when the run was cancelled.
    Unresolved,
}

/// A per-asset problem recorded in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIssue {
    pub kind: IssueKind,
    pub logical_url: String,
    pub source_path: PathBuf,
    pub message: String,
}

/// Progress event emitted during a publish run.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishEvent {
    /// Scanning and classification finished.
    Scanned { assets: usize, skipped: usize },
    /// One upload finished.
    Uploaded {
        logical_url: String,
        source: UploadSource,
    },
    /// Descriptor built.
    Completed { mapped: usize, degraded: usize },
}

/// Summary of one batch for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub tier: u8,
    pub encoded_bytes: u64,
    pub urls: Vec<String>,
}

/// Everything a publish run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    #[serde(skip)]
    pub descriptor: RegistrationDescriptor,
    /// One registration payload per batch, tier 0 first.
    #[serde(skip)]
    pub registrations: Vec<RegistrationChunk>,
    pub totals: DescriptorTotals,
    pub batches: Vec<BatchSummary>,
    /// Upload outcome per referenced logical URL.
    pub results: BTreeMap<String, UploadResult>,
    pub issues: Vec<AssetIssue>,
}

impl IssueKind {
    /// Whether an issue of this kind kept an asset out of the descriptor
    /// because its bytes could not be used.
    pub fn is_skip(self) -> bool {
        matches!(self, Self::NotFound | Self::Unreadable | Self::Encoding)
    }
}

impl PublishReport {
    /// Issues of one kind.
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &AssetIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    /// Number of assets dropped because they could not be read or encoded.
    pub fn skipped(&self) -> usize {
        self.issues.iter().filter(|i| i.kind.is_skip()).count()
    }

    /// Logical URLs published under a local-fallback hash.
    pub fn degraded_urls(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_degraded())
            .map(|(url, _)| url.as_str())
            .collect()
    }
}
