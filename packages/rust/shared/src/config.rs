//! Application configuration for tldr.
//!
//! User config lives at `~/.tldr/tldr.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TldrError};
use crate::types::PlatformSet;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tldr.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tldr";

/// Where the upstream project publishes the page archive.
pub const DEFAULT_ARCHIVE_URL: &str = "https://tldr.sh/assets/tldr.zip";

// ---------------------------------------------------------------------------
// Config structs (matching tldr.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Archive download settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Page cache location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Rendering and lookup defaults.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Update pipeline settings.
    #[serde(default)]
    pub update: UpdateSection,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL of the zip archive holding all pages.
    #[serde(default = "default_archive_url")]
    pub archive_url: String,

    /// HTTP timeout in seconds; unset leaves the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            archive_url: default_archive_url(),
            timeout_secs: None,
        }
    }
}

fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.into()
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the page cache database. A leading `~/` is expanded.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.tldr/pages.db".into()
}

/// `[display]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Platform partition to search before `common` (detected if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Page language. Only English pages are cached.
    #[serde(default = "default_language")]
    pub language: String,

    /// When to emit ANSI styling.
    #[serde(default)]
    pub color: ColorMode,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            platform: None,
            language: default_language(),
            color: ColorMode::default(),
        }
    }
}

fn default_language() -> String {
    "en".into()
}

/// Styling policy for rendered pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Style only when stdout is a terminal.
    #[default]
    Auto,
    /// Always emit escape codes.
    Always,
    /// Never style; pages are passed through verbatim.
    Never,
}

impl ColorMode {
    /// Decide whether to style given whether stdout is a terminal.
    pub fn should_style(self, is_terminal: bool) -> bool {
        match self {
            Self::Auto => is_terminal,
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// `[update]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSection {
    /// How the old root container is replaced.
    #[serde(default)]
    pub strategy: UpdateStrategy,

    /// Platform partitions to build (defaults to the built-in set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
}

/// Root replacement policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStrategy {
    /// Delete the old root in one transaction, repopulate in a second.
    /// A crash between the two leaves an empty cache.
    #[default]
    DeleteThenCreate,
    /// Delete and repopulate inside a single transaction.
    StageAndSwap,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime update configuration.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Archive location.
    pub archive_url: Url,
    /// Optional HTTP timeout.
    pub timeout: Option<Duration>,
    /// Root replacement policy.
    pub strategy: UpdateStrategy,
    /// Partitions of the new root container.
    pub platforms: PlatformSet,
}

impl TryFrom<&AppConfig> for UpdateConfig {
    type Error = TldrError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let archive_url = Url::parse(&config.source.archive_url).map_err(|e| {
            TldrError::config(format!(
                "invalid archive_url '{}': {e}",
                config.source.archive_url
            ))
        })?;

        Ok(Self {
            archive_url,
            timeout: config.source.timeout_secs.map(Duration::from_secs),
            strategy: config.update.strategy,
            platforms: config.platform_set()?,
        })
    }
}

impl AppConfig {
    /// The platform set configured for update and lookup.
    pub fn platform_set(&self) -> Result<PlatformSet> {
        match &self.update.platforms {
            Some(names) => PlatformSet::new(names),
            None => Ok(PlatformSet::builtin()),
        }
    }

    /// The database path with `~/` expanded.
    pub fn database_path(&self) -> Result<PathBuf> {
        expand_home(&self.database.path)
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| TldrError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tldr/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TldrError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tldr/tldr.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TldrError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TldrError::config(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("archive_url"));
        assert!(toml_str.contains("delete-then-create"));
        assert!(toml_str.contains("color = \"auto\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.archive_url, DEFAULT_ARCHIVE_URL);
        assert_eq!(parsed.display.language, "en");
        assert_eq!(parsed.update.strategy, UpdateStrategy::DeleteThenCreate);
    }

    #[test]
    fn config_with_overrides() {
        let toml_str = r#"
[source]
archive_url = "http://localhost:8080/pages.zip"
timeout_secs = 15

[display]
platform = "osx"
color = "never"

[update]
strategy = "stage-and-swap"
platforms = ["linux", "osx"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.display.platform.as_deref(), Some("osx"));
        assert_eq!(config.display.color, ColorMode::Never);

        let update = UpdateConfig::try_from(&config).expect("update config");
        assert_eq!(update.archive_url.as_str(), "http://localhost:8080/pages.zip");
        assert_eq!(update.timeout, Some(Duration::from_secs(15)));
        assert_eq!(update.strategy, UpdateStrategy::StageAndSwap);
        assert_eq!(update.platforms.partitions(), vec!["linux", "osx", "common"]);
    }

    #[test]
    fn invalid_archive_url_is_config_error() {
        let mut config = AppConfig::default();
        config.source.archive_url = "not a url".into();
        let err = UpdateConfig::try_from(&config).unwrap_err();
        assert!(matches!(err, TldrError::Config { .. }));
    }

    #[test]
    fn color_mode_decision() {
        assert!(ColorMode::Auto.should_style(true));
        assert!(!ColorMode::Auto.should_style(false));
        assert!(ColorMode::Always.should_style(false));
        assert!(!ColorMode::Never.should_style(true));
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(
            expand_home("/var/cache/tldr.db").unwrap(),
            PathBuf::from("/var/cache/tldr.db")
        );
    }
}
