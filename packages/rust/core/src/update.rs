//! Full-replace update of the page cache.
//!
//! Downloads the upstream archive, routes every `pages/<target>/<command>.md`
//! entry to its partition, compresses it, and writes a brand-new root
//! container. Nothing is merged with the previous cache.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use tldr_archive::{ArchiveSource, PageArchive};
use tldr_shared::{
    PAGE_EXTENSION, PAGES_PREFIX, PlatformSet, Result, UpdateConfig, UpdateStrategy,
};
use tldr_storage::Storage;

use crate::codec;

// ---------------------------------------------------------------------------
// Report & progress
// ---------------------------------------------------------------------------

/// Outcome of a successful update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Where the archive came from.
    pub source: String,
    /// Pages stored per partition. Every partition of the new root is present.
    pub stored: BTreeMap<String, usize>,
    /// Archive entries that did not route to any partition.
    pub skipped: usize,
    /// Entries that routed but could not be read.
    pub warnings: Vec<String>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl UpdateReport {
    fn new(source: String, partitions: &[String]) -> Self {
        Self {
            source,
            stored: partitions.iter().map(|p| (p.clone(), 0)).collect(),
            ..Self::default()
        }
    }

    /// Total pages stored across all partitions.
    pub fn total_stored(&self) -> usize {
        self.stored.values().sum()
    }
}

/// Progress callback for reporting update status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each page is written.
    fn page_stored(&self, path: &str, current: usize, total: usize);
    /// Called when the new root has been committed.
    fn done(&self, report: &UpdateReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_stored(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &UpdateReport) {}
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Map an archive path to `(partition, command)`.
///
/// Only `pages/<target>/<command>.md` with a single directory level routes,
/// and only when `target` is a partition of `platforms`. Translated pages
/// live under `pages.<lang>/` and fail the prefix check.
pub fn route_entry<'a>(path: &'a str, platforms: &PlatformSet) -> Option<(&'a str, &'a str)> {
    let rest = path.strip_prefix(PAGES_PREFIX)?;
    let (target, file) = rest.split_once('/')?;
    if file.contains('/') || !platforms.is_partition(target) {
        return None;
    }

    let command = file.strip_suffix(PAGE_EXTENSION)?;
    if command.is_empty() {
        return None;
    }
    Some((target, command))
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Replace the page cache with the contents of `source`.
///
/// 1. Fetch the archive bytes
/// 2. Decode the zip
/// 3. Drop the old root and open a new one (per [`UpdateStrategy`])
/// 4. Route, compress and store every page entry
/// 5. Commit, then record the run in the update log
///
/// Fetch and decode failures leave the store untouched. A read failure on a
/// single entry is logged and the entry skipped.
#[instrument(skip_all, fields(source = %source.location(), strategy = ?config.strategy))]
pub async fn update<S: ArchiveSource>(
    config: &UpdateConfig,
    source: &S,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<UpdateReport> {
    let start = Instant::now();
    let started_at = Utc::now();

    progress.phase("Downloading pages");
    let bytes = source.fetch().await?;
    debug!(bytes = bytes.len(), "archive downloaded");

    progress.phase("Reading archive");
    let mut archive = PageArchive::decode(bytes)?;
    let paths = archive.paths();
    info!(entries = paths.len(), "archive decoded");

    progress.phase("Replacing page cache");
    let partitions = config.platforms.partitions();
    let mut root = match config.strategy {
        UpdateStrategy::DeleteThenCreate => storage.replace_root(&partitions).await?,
        UpdateStrategy::StageAndSwap => storage.swap_root(&partitions).await?,
    };

    let mut report = UpdateReport::new(source.location(), &partitions);
    let total = paths.len();

    for (index, path) in paths.iter().enumerate() {
        let Some((partition, command)) = route_entry(path, &config.platforms) else {
            report.skipped += 1;
            continue;
        };

        let content = match archive.read(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path, error = %e, "failed to read archive entry, skipping");
                report.warnings.push(e.to_string());
                continue;
            }
        };

        if let Err(e) = root.put(partition, command, &codec::compress(&content)).await {
            if let Err(rollback) = root.rollback().await {
                warn!(error = %rollback, "rollback after failed write also failed");
            }
            return Err(e);
        }

        *report.stored.entry(partition.to_string()).or_default() += 1;
        progress.page_stored(path, index + 1, total);
    }

    let written = root.commit().await?;
    report.elapsed = start.elapsed();

    info!(
        stored = written,
        skipped = report.skipped,
        warnings = report.warnings.len(),
        elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "page cache replaced"
    );

    // The new root is already committed; a missing log row is not worth failing for.
    match serde_json::to_string(&report) {
        Ok(stats) => {
            if let Err(e) = storage.record_update(started_at, &stats).await {
                warn!(error = %e, "failed to record update");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize update report"),
    }

    progress.done(&report);
    Ok(report)
}
