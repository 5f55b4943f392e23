//! Manifest of already-published content.
//!
//! Maps the local hash of every asset the store confirmed to the
//! identifier it was published under, so unchanged assets skip the
//! network on the next run. Entries only hold for the store endpoint that
//! confirmed them. Stored as JSON next to the config:
//!
//! ```json
//! {
//!   "version": 2,
//!   "endpoint": "http://localhost:9333/api/v1",
//!   "entries": { "b94d27b9934d3e08": "QmStoreId" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sitepub_content::ContentHash;
use tracing::{debug, warn};

use crate::error::PublishError;

const MANIFEST_VERSION: u32 = 2;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    version: u32,
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Local hash → published hash cache for one store endpoint.
#[derive(Debug, Default)]
pub struct ManifestCache {
    path: Option<PathBuf>,
    endpoint: String,
    entries: BTreeMap<String, String>,
    dirty: bool,
}

impl ManifestCache {
    /// A cache that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the manifest at `path` for uploads to `endpoint`.
    ///
    /// A missing file starts an empty cache. An unreadable or foreign file,
    /// or one recorded against another endpoint, is logged and ignored; it
    /// is overwritten on the next save.
    pub fn load(path: &Path, endpoint: &str) -> Self {
        let endpoint = normalize_endpoint(endpoint);
        let entries = match std::fs::read(path) {
            Ok(data) => match serde_json::from_slice::<ManifestFile>(&data) {
                Ok(file) if file.version != MANIFEST_VERSION => {
                    warn!(
                        path = %path.display(),
                        version = file.version,
                        "unsupported manifest version, starting empty"
                    );
                    BTreeMap::new()
                }
                Ok(file) if normalize_endpoint(&file.endpoint) != endpoint => {
                    warn!(
                        path = %path.display(),
                        recorded = %file.endpoint,
                        endpoint = %endpoint,
                        "manifest belongs to another store endpoint, starting empty"
                    );
                    BTreeMap::new()
                }
                Ok(file) => file.entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt manifest, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read manifest, starting empty");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "manifest loaded");

        Self {
            path: Some(path.to_path_buf()),
            endpoint: endpoint.to_string(),
            entries,
            dirty: false,
        }
    }

    /// Opens the configured manifest, or an in-memory cache when none is set.
    pub fn open(path: Option<&Path>, endpoint: &str) -> Self {
        match path {
            Some(path) => Self::load(path, endpoint),
            None => Self::in_memory(),
        }
    }

    /// Published hash recorded for `local`.
    pub fn get(&self, local: &ContentHash) -> Option<&str> {
        self.entries.get(local.as_str()).map(String::as_str)
    }

    /// Records a confirmed publication.
    pub fn record(&mut self, local: &ContentHash, published: &str) {
        let previous = self
            .entries
            .insert(local.to_string(), published.to_string());
        if previous.as_deref() != Some(published) {
            self.dirty = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the manifest if it changed.
    ///
    /// The file is written to a sibling temp file and renamed into place,
    /// so an interrupted save leaves the previous manifest intact.
    pub fn save(&mut self) -> Result<(), PublishError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = ManifestFile {
            version: MANIFEST_VERSION,
            endpoint: self.endpoint.clone(),
            entries: self.entries.clone(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, path)?;

        self.dirty = false;
        debug!(path = %path.display(), entries = self.entries.len(), "manifest saved");
        Ok(())
    }
}

/// Endpoints differing only by a trailing slash name the same store.
fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim().trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepub_content::content_hash;

    const STAGING: &str = "http://staging.example:9333/api/v1";
    const PROD: &str = "http://prod.example:9333/api/v1";

    #[test]
    fn record_and_get() {
        let mut cache = ManifestCache::in_memory();
        let local = content_hash(b"logo");
        assert!(cache.get(&local).is_none());

        cache.record(&local, "QmLogo");
        assert_eq!(cache.get(&local), Some("QmLogo"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("manifest.json");

        let mut cache = ManifestCache::load(&path, STAGING);
        assert!(cache.is_empty());
        cache.record(&content_hash(b"a"), "QmA");
        cache.record(&content_hash(b"b"), "QmB");
        cache.save().unwrap();

        let loaded = ManifestCache::load(&path, STAGING);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&content_hash(b"b")), Some("QmB"));

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["version"], 2);
        assert_eq!(json["endpoint"], STAGING);
        assert!(!dir.path().join("state").join("manifest.json.tmp").exists());
    }

    #[test]
    fn corrupt_manifest_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, b"{not json").unwrap();

        let mut cache = ManifestCache::load(&path, STAGING);
        assert!(cache.is_empty());

        cache.record(&content_hash(b"a"), "QmA");
        cache.save().unwrap();
        assert_eq!(ManifestCache::load(&path, STAGING).len(), 1);
    }

    #[test]
    fn unknown_version_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let data = br#"{"version":9,"endpoint":"","entries":{"b94d27b9934d3e08":"x"}}"#;
        std::fs::write(&path, data).unwrap();
        assert!(ManifestCache::load(&path, STAGING).is_empty());
    }

    #[test]
    fn unchanged_cache_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut cache = ManifestCache::load(&path, STAGING);
        cache.save().unwrap();
        assert!(!path.exists());

        cache.record(&content_hash(b"a"), "QmA");
        cache.save().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn in_memory_save_is_noop() {
        let mut cache = ManifestCache::open(None, STAGING);
        cache.record(&content_hash(b"a"), "QmA");
        assert!(cache.save().is_ok());
        assert!(cache.path().is_none());
    }

    #[test]
    fn other_endpoint_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut staging = ManifestCache::load(&path, STAGING);
        staging.record(&content_hash(b"a"), "QmA");
        staging.save().unwrap();

        let mut prod = ManifestCache::load(&path, PROD);
        assert!(prod.get(&content_hash(b"a")).is_none());
        prod.record(&content_hash(b"b"), "QmB");
        prod.save().unwrap();

        // The manifest now belongs to prod; staging entries are gone.
        assert!(ManifestCache::load(&path, STAGING).is_empty());
        let reopened = ManifestCache::load(&path, &format!("{PROD}/"));
        assert_eq!(reopened.get(&content_hash(b"b")), Some("QmB"));
        assert!(reopened.get(&content_hash(b"a")).is_none());
    }

    #[test]
    fn manifest_without_endpoint_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, br#"{"version":2,"entries":{"b94d27b9934d3e08":"x"}}"#).unwrap();
        assert!(ManifestCache::load(&path, PROD).is_empty());
    }
}
