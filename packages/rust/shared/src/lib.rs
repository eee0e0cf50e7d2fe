//! Shared types, error model, and configuration for tldr.
//!
//! This crate is the foundation depended on by all other tldr crates.
//! It provides:
//! - [`TldrError`]: the unified error type
//! - Domain types ([`PlatformSet`], partition and archive layout constants)
//! - Configuration ([`AppConfig`], [`UpdateConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColorMode, DEFAULT_ARCHIVE_URL, DatabaseConfig, DisplayConfig, SourceConfig,
    UpdateConfig, UpdateSection, UpdateStrategy, config_dir, config_file_path, expand_home,
    load_config, load_config_from,
};
pub use error::{Result, TldrError};
pub use types::{
    COMMON_PARTITION, KNOWN_PLATFORMS, PAGE_EXTENSION, PAGES_PREFIX, PlatformSet,
    current_platform, platform_for_os,
};
