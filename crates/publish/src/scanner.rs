//! Asset inventory.
//!
//! Walks the site root in lexical order and maps each file to its logical
//! URL. No file contents are read here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::Override;
use sitepub_content::validate_logical_url;

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::rules::walk_overrides;
use crate::types::AssetEntry;

/// Restartable inventory of a site directory.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    overrides: Override,
    routes: BTreeMap<String, String>,
}

impl Scanner {
    /// Creates a scanner for `root`.
    ///
    /// Fails with [`PublishError::NotFound`] if `root` is not a directory.
    pub fn new(
        root: &Path,
        include: &[String],
        exclude: &[String],
        routes: BTreeMap<String, String>,
    ) -> Result<Self, PublishError> {
        if !root.is_dir() {
            return Err(PublishError::NotFound(root.to_path_buf()));
        }
        for url in routes.values() {
            validate_logical_url(url)?;
        }
        let overrides = walk_overrides(root, include, exclude)?;
        Ok(Self {
            root: root.to_path_buf(),
            overrides,
            routes,
        })
    }

    pub fn from_config(config: &PublishConfig) -> Result<Self, PublishError> {
        Self::new(
            &config.root,
            &config.include,
            &config.exclude,
            config.routes.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a fresh walk.
    ///
    /// Siblings are visited in byte order of their names, so two walks of
    /// an unchanged tree yield the same sequence. Symlinks are followed and
    /// published under the link's own path. Walk errors, including broken
    /// or looping links, are yielded per entry and do not stop the
    /// iteration.
    pub fn entries(&self) -> impl Iterator<Item = Result<AssetEntry, PublishError>> + '_ {
        WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(true)
            .overrides(self.overrides.clone())
            .sort_by_file_name(|a, b| a.cmp(b))
            .build()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
                    if is_file {
                        Some(self.entry_for(entry.path()))
                    } else {
                        None
                    }
                }
                Err(e) => Some(Err(PublishError::Scan(e.to_string()))),
            })
    }

    fn entry_for(&self, path: &Path) -> Result<AssetEntry, PublishError> {
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|e| PublishError::Scan(format!("{}: {e}", path.display())))?;

        // Normalize to forward slashes.
        let relative_path = rel.to_string_lossy().replace('\\', "/");
        let logical_url = self.logical_url(&relative_path);

        Ok(AssetEntry {
            source_path: path.to_path_buf(),
            relative_path,
            logical_url,
        })
    }

    /// Maps a relative path to its logical URL.
    ///
    /// Route overrides win; the root `index.html` is served at `/`.
    pub fn logical_url(&self, relative_path: &str) -> String {
        if let Some(url) = self.routes.get(relative_path) {
            return url.clone();
        }
        if relative_path == "index.html" {
            return "/".to_string();
        }
        format!("/{relative_path}")
    }
}
