//! Configuration file discovery.
//!
//! The config file is `$SITEPUB_CONFIG` when set, otherwise `sitepub.toml`
//! in the working directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use sitepub_publish::{PublishConfig, PublishError};

pub const CONFIG_ENV: &str = "SITEPUB_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "sitepub.toml";

/// Returns the configuration file path.
pub fn config_path() -> PathBuf {
    resolve_config_path(std::env::var_os(CONFIG_ENV))
}

fn resolve_config_path(env: Option<OsString>) -> PathBuf {
    match env {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Loads the configuration at `path`.
///
/// A missing file is replaced by a default template and reported as an
/// error, since `domain` and `owner` have no defaults.
pub fn load(path: &Path) -> anyhow::Result<PublishConfig> {
    match PublishConfig::load(path) {
        Ok(config) => {
            config
                .validate()
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            Ok(config)
        }
        Err(PublishError::NotFound(_)) => {
            write_template(path)?;
            bail!(
                "no configuration found; wrote a template to {} (set domain and owner, then rerun)",
                path.display()
            )
        }
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

fn write_template(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&PublishConfig::default())?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "configuration template written");
    Ok(())
}
