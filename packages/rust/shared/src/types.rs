//! Core domain types for the page cache: partitions and the platform set.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, TldrError};

/// Name of the partition shared by every platform.
pub const COMMON_PARTITION: &str = "common";

/// Directory prefix of English pages inside the upstream archive.
pub const PAGES_PREFIX: &str = "pages/";

/// File extension of a page inside the upstream archive.
pub const PAGE_EXTENSION: &str = ".md";

/// Platform directories published upstream that this client knows about.
pub const KNOWN_PLATFORMS: &[&str] = &[
    "android", "freebsd", "linux", "netbsd", "openbsd", "osx", "sunos", "windows",
];

// ---------------------------------------------------------------------------
// PlatformSet
// ---------------------------------------------------------------------------

/// The fixed set of platform partitions a root container is built from.
///
/// `common` is never a member; it is implied by every set. Ordering is
/// alphabetical so listings and partition creation are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSet {
    platforms: BTreeSet<String>,
}

impl PlatformSet {
    /// Build a set from platform names.
    ///
    /// Names are lowercased and trimmed. `common` and empty names are rejected
    /// so the shared partition cannot be shadowed by a platform.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut platforms = BTreeSet::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() || name == COMMON_PARTITION || name.contains('/') {
                return Err(TldrError::validation(format!(
                    "invalid platform name '{name}'"
                )));
            }
            platforms.insert(name);
        }
        Ok(Self { platforms })
    }

    /// The built-in platform set.
    pub fn builtin() -> Self {
        Self {
            platforms: KNOWN_PLATFORMS.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// Whether `name` is one of the platforms (not counting `common`).
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains(name)
    }

    /// Whether `name` names a partition of the root container.
    pub fn is_partition(&self, name: &str) -> bool {
        name == COMMON_PARTITION || self.contains(name)
    }

    /// Platform names, alphabetically.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.platforms.iter().map(String::as_str)
    }

    /// Every partition of the root container: all platforms followed by `common`.
    pub fn partitions(&self) -> Vec<String> {
        self.platforms
            .iter()
            .cloned()
            .chain(std::iter::once(COMMON_PARTITION.to_string()))
            .collect()
    }

    /// Resolve a user-supplied platform name against this set.
    pub fn resolve(&self, name: &str) -> Result<String> {
        let name = name.trim().to_lowercase();
        if self.contains(&name) {
            return Ok(name);
        }
        let known: Vec<&str> = self.platforms().collect();
        Err(TldrError::validation(format!(
            "unknown platform '{name}': expected one of {}",
            known.join(", ")
        )))
    }
}

impl Default for PlatformSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.platforms().collect();
        write!(f, "{}", names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Platform detection
// ---------------------------------------------------------------------------

/// Map a Rust target OS name to the upstream platform directory.
pub fn platform_for_os(os: &str) -> Option<&'static str> {
    match os {
        "linux" => Some("linux"),
        "macos" => Some("osx"),
        "windows" => Some("windows"),
        "solaris" | "illumos" => Some("sunos"),
        "android" => Some("android"),
        "freebsd" => Some("freebsd"),
        "netbsd" => Some("netbsd"),
        "openbsd" => Some("openbsd"),
        _ => None,
    }
}

/// The platform directory for the OS this binary was built for.
pub fn current_platform() -> Option<&'static str> {
    platform_for_os(std::env::consts::OS)
}
