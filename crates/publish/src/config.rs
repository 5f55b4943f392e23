//! Publish configuration.
//!
//! Every field has a default so a config file only needs to name what
//! differs. The rule tables (`include`, `exclude`, `routes`,
//! `content_types`, `binary_extensions`, `tiers`) replace hardcoded file
//! lists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitepub_protocol::SiteMetadata;
use sitepub_protocol::constants::{
    DEFAULT_INLINE_THRESHOLD, DEFAULT_MAX_BATCH_BYTES, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_UPLOAD_CONCURRENCY, REGISTRATION_PAYLOAD_LIMIT,
};

use crate::error::PublishError;

/// Settings for one publish run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Built site directory to publish.
    pub root: PathBuf,
    /// Where descriptor, registration chunks and report are written.
    pub output_dir: PathBuf,

    pub domain: String,
    pub owner: String,

    /// Store API base URL; uploads go to `{endpoint}/storage/store`.
    pub endpoint: String,
    pub request_timeout_secs: u64,
    /// Whole-run deadline for uploads (none by default).
    pub run_timeout_secs: Option<u64>,
    pub concurrency: usize,

    pub max_batch_bytes: u64,
    /// Text assets up to this encoded size are embedded inline.
    pub inline_threshold: u64,
    pub registration_limit_bytes: u64,

    /// Manifest of already-published hashes (`None` disables the cache).
    pub manifest_path: Option<PathBuf>,

    /// Gitignore-style globs; when non-empty only matching files are scanned.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Extra extensions always treated as binary.
    pub binary_extensions: Vec<String>,

    // TOML tables must follow plain values.
    pub metadata: SiteMetadata,
    /// Relative path → logical URL overrides.
    pub routes: BTreeMap<String, String>,
    /// Extension → content type overrides.
    pub content_types: BTreeMap<String, String>,
    pub tiers: TierConfig,
}

/// Role → tier rule table. Globs match paths relative to the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Assets the site cannot render without.
    pub tier0: Vec<String>,
    /// Shared and vendor bundles.
    pub tier1: Vec<String>,
    /// Dropped before batching.
    pub exclude: Vec<String>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            tier0: vec![
                "/index.html".into(),
                "/assets/index.*.css".into(),
                "/assets/index.*.js".into(),
                "/assets/logo.*".into(),
                "/style.css".into(),
                "/logo.*".into(),
            ],
            tier1: vec!["*vendor*".into()],
            exclude: vec!["*.map".into()],
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dist"),
            output_dir: PathBuf::from("publish-out"),
            domain: String::new(),
            owner: String::new(),
            metadata: SiteMetadata::default(),
            endpoint: "http://localhost:9333/api/v1".into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            run_timeout_secs: None,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            registration_limit_bytes: REGISTRATION_PAYLOAD_LIMIT,
            manifest_path: Some(PathBuf::from(".sitepub-manifest.json")),
            include: Vec::new(),
            exclude: Vec::new(),
            routes: BTreeMap::new(),
            content_types: BTreeMap::new(),
            binary_extensions: Vec::new(),
            tiers: TierConfig::default(),
        }
    }
}

impl PublishConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, PublishError> {
        toml::from_str(content).map_err(|e| PublishError::Config(e.to_string()))
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> Result<Self, PublishError> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PublishError::NotFound(path.to_path_buf()),
            _ => PublishError::Io(e),
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks values that would otherwise fail halfway through a run.
    pub fn validate(&self) -> Result<(), PublishError> {
        if self.domain.trim().is_empty() {
            return Err(PublishError::Config("domain must not be empty".into()));
        }
        if self.owner.trim().is_empty() {
            return Err(PublishError::Config("owner must not be empty".into()));
        }
        if self.concurrency == 0 {
            return Err(PublishError::Config("concurrency must be at least 1".into()));
        }
        if self.max_batch_bytes == 0 {
            return Err(PublishError::Config(
                "max_batch_bytes must be positive".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(PublishError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        for url in self.routes.values() {
            sitepub_content::validate_logical_url(url)?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PublishConfig {
        PublishConfig {
            domain: "example.zhtp".into(),
            owner: "site_team".into(),
            ..PublishConfig::default()
        }
    }

    #[test]
    fn default_config() {
        let config = PublishConfig::default();
        assert_eq!(config.max_batch_bytes, 10 * 1024 * 1024);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.run_timeout().is_none());
        assert_eq!(config.tiers.exclude, vec!["*.map"]);
        assert!(config.metadata.public);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
            domain = "example.zhtp"
            owner = "site_team"
            concurrency = 8

            [metadata]
            title = "Example"
            tags = ["web4", "mesh"]

            [routes]
            "prerendered/index.html" = "/"

            [tiers]
            tier1 = ["*vendor*", "*runtime*"]
        "#;
        let config = PublishConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.domain, "example.zhtp");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.metadata.title, "Example");
        assert_eq!(config.metadata.tags, vec!["web4", "mesh"]);
        assert!(config.metadata.public);
        assert_eq!(config.routes["prerendered/index.html"], "/");
        assert_eq!(config.tiers.tier1, vec!["*vendor*", "*runtime*"]);
        // Unspecified tables keep their defaults.
        assert_eq!(config.tiers.exclude, vec!["*.map"]);
        assert_eq!(config.max_batch_bytes, DEFAULT_MAX_BATCH_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let result = PublishConfig::from_toml_str("concurrency = \"many\"");
        assert!(matches!(result, Err(PublishError::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_domain() {
        let config = PublishConfig {
            domain: " ".into(),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(PublishError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config = PublishConfig {
            concurrency: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_route() {
        let mut config = valid();
        config
            .routes
            .insert("index.html".into(), "../escape".into());
        assert!(matches!(config.validate(), Err(PublishError::InvalidUrl(_))));
    }

    #[test]
    fn load_missing_file() {
        let result = PublishConfig::load(Path::new("/nonexistent/sitepub.toml"));
        assert!(matches!(result, Err(PublishError::NotFound(_))));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitepub.toml");
        let config = PublishConfig {
            run_timeout_secs: Some(120),
            ..valid()
        };
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = PublishConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
