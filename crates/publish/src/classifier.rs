//! Content type detection, binary disposition and payload loading.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use sitepub_content::{ContentError, Payload, content_hash};
use sitepub_protocol::constants::FALLBACK_CONTENT_TYPE;

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::types::{AssetEntry, SiteAsset};

/// Extensions that are binary regardless of their content type.
const BINARY_EXTENSIONS: &[&str] = &[
    "woff", "woff2", "ttf", "otf", "eot", "zip", "gz", "tgz", "br", "wasm", "pdf",
];

/// Content type prefixes that are always binary.
const BINARY_TYPE_PREFIXES: &[&str] = &["image/", "font/", "audio/", "video/"];

/// Content type and binary disposition of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub content_type: String,
    pub is_binary: bool,
}

/// Extension-driven classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    /// Lowercased extension → content type overrides.
    content_types: BTreeMap<String, String>,
    /// Lowercased extra binary extensions.
    binary_extensions: BTreeSet<String>,
}

impl Classifier {
    pub fn new(content_types: &BTreeMap<String, String>, binary_extensions: &[String]) -> Self {
        Self {
            content_types: content_types
                .iter()
                .map(|(ext, ct)| (normalize_ext(ext), ct.clone()))
                .collect(),
            binary_extensions: binary_extensions.iter().map(|e| normalize_ext(e)).collect(),
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(&config.content_types, &config.binary_extensions)
    }

    /// Determines the content type of `path`.
    ///
    /// Lookup order: configured overrides, the built-in table, `mime_guess`,
    /// then `application/octet-stream`.
    pub fn content_type(&self, path: &Path) -> String {
        let Some(ext) = extension(path) else {
            return FALLBACK_CONTENT_TYPE.to_string();
        };

        if let Some(ct) = self.content_types.get(&ext) {
            return ct.clone();
        }
        if let Some(ct) = detect_content_type(&ext) {
            return ct.to_string();
        }
        mime_guess::from_ext(&ext)
            .first_raw()
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string()
    }

    /// Classifies `path` by extension.
    pub fn classify(&self, path: &Path) -> Classification {
        let content_type = self.content_type(path);
        let binary_ext = extension(path).is_some_and(|ext| {
            BINARY_EXTENSIONS.contains(&ext.as_str()) || self.binary_extensions.contains(&ext)
        });
        let is_binary = binary_ext
            || content_type == FALLBACK_CONTENT_TYPE
            || BINARY_TYPE_PREFIXES
                .iter()
                .any(|prefix| content_type.starts_with(prefix));

        Classification {
            content_type,
            is_binary,
        }
    }

    /// Reads, classifies, hashes and encodes one scanned entry.
    ///
    /// Fails with [`PublishError::NotFound`] if the file vanished and with
    /// [`PublishError::Encoding`] if a text asset is not valid UTF-8.
    pub fn load(&self, entry: &AssetEntry, tier: u8) -> Result<SiteAsset, PublishError> {
        let raw = std::fs::read(&entry.source_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PublishError::NotFound(entry.source_path.clone()),
            _ => PublishError::Io(e),
        })?;

        let Classification {
            content_type,
            is_binary,
        } = self.classify(&entry.source_path);
        let size = raw.len() as u64;
        let hash = content_hash(&raw);

        let payload = Payload::encode(raw, is_binary).map_err(|e| match e {
            ContentError::Encoding { valid_up_to } => PublishError::Encoding {
                path: entry.source_path.clone(),
                valid_up_to,
            },
            other => PublishError::Content(other),
        })?;

        Ok(SiteAsset {
            source_path: entry.source_path.clone(),
            relative_path: entry.relative_path.clone(),
            logical_url: entry.logical_url.clone(),
            content_type,
            is_binary,
            tier,
            size,
            hash,
            payload,
        })
    }
}

/// Built-in extension table for common site assets.
pub fn detect_content_type(ext: &str) -> Option<&'static str> {
    match ext {
        "html" | "htm" => Some("text/html"),
        "css" => Some("text/css"),
        "js" | "mjs" => Some("application/javascript"),
        "json" | "map" => Some("application/json"),
        "webmanifest" => Some("application/manifest+json"),
        "txt" => Some("text/plain"),
        "xml" => Some("application/xml"),
        "svg" => Some("image/svg+xml"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "ico" => Some("image/x-icon"),
        "woff" => Some("font/woff"),
        "woff2" => Some("font/woff2"),
        "ttf" => Some("font/ttf"),
        "otf" => Some("font/otf"),
        "eot" => Some("application/vnd.ms-fontobject"),
        "wasm" => Some("application/wasm"),
        "pdf" => Some("application/pdf"),
        "zip" => Some("application/zip"),
        "gz" => Some("application/gzip"),
        _ => None,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}
