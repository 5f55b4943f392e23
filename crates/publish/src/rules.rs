//! Declarative path rules.
//!
//! Globs use gitignore syntax: a pattern without `/` matches the file name
//! at any depth, a leading `/` anchors the pattern to the site root.

use std::path::Path;

use ignore::overrides::{Override, OverrideBuilder};

use crate::error::PublishError;

/// A set of globs matched against root-relative paths.
#[derive(Debug, Clone)]
pub struct PathRules {
    matcher: Override,
}

impl PathRules {
    /// Compiles `globs`. An empty list matches nothing.
    pub fn new(globs: &[String]) -> Result<Self, PublishError> {
        let mut builder = OverrideBuilder::new(".");
        for glob in globs {
            if glob.starts_with('!') {
                return Err(PublishError::InvalidRule(format!(
                    "negated globs are not supported here: {glob}"
                )));
            }
            builder
                .add(glob)
                .map_err(|e| PublishError::InvalidRule(format!("{glob}: {e}")))?;
        }
        let matcher = builder
            .build()
            .map_err(|e| PublishError::InvalidRule(e.to_string()))?;
        Ok(Self { matcher })
    }

    /// Returns `true` if the `/`-separated relative path matches any glob.
    pub fn matches(&self, relative_path: &str) -> bool {
        self.matcher
            .matched(Path::new(relative_path), false)
            .is_whitelist()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }
}

/// Builds the scanner's walk filter from include and exclude globs.
///
/// With no includes every file passes; excludes always win.
pub fn walk_overrides(
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Override, PublishError> {
    let mut builder = OverrideBuilder::new(root);
    for glob in include {
        builder
            .add(glob)
            .map_err(|e| PublishError::InvalidRule(format!("{glob}: {e}")))?;
    }
    for glob in exclude {
        let negated = format!("!{glob}");
        builder
            .add(&negated)
            .map_err(|e| PublishError::InvalidRule(format!("{glob}: {e}")))?;
    }
    builder
        .build()
        .map_err(|e| PublishError::InvalidRule(e.to_string()))
}
