//! Page lookup with platform → `common` fallback.

use std::collections::BTreeSet;
use std::future::Future;
use std::io::Write;

use tracing::{debug, instrument};

use tldr_shared::{COMMON_PARTITION, Result, TldrError};
use tldr_storage::Storage;

use crate::codec;

/// Read access to a populated page cache.
pub trait PageSource {
    /// Whether the cache holds no pages at all.
    fn is_empty(&self) -> impl Future<Output = Result<bool>>;

    /// The stored blob for `command` in `partition`.
    fn get(&self, partition: &str, command: &str) -> impl Future<Output = Result<Option<Vec<u8>>>>;

    /// Commands stored in `partition`.
    fn list_commands(&self, partition: &str) -> impl Future<Output = Result<Vec<String>>>;
}

impl PageSource for Storage {
    async fn is_empty(&self) -> Result<bool> {
        Storage::is_empty(self).await
    }

    async fn get(&self, partition: &str, command: &str) -> Result<Option<Vec<u8>>> {
        Storage::get(self, partition, command).await
    }

    async fn list_commands(&self, partition: &str) -> Result<Vec<String>> {
        Storage::list_commands(self, partition).await
    }
}

/// A page found in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Partition the page was served from.
    pub partition: String,
    pub command: String,
    /// Decompressed markup.
    pub text: String,
}

/// Partitions searched for `platform`, most specific first.
fn search_order(platform: Option<&str>) -> Vec<&str> {
    let mut order = Vec::with_capacity(2);
    if let Some(platform) = platform.filter(|p| *p != COMMON_PARTITION) {
        order.push(platform);
    }
    order.push(COMMON_PARTITION);
    order
}

/// Find `command` for `platform`, falling back to `common`.
///
/// An empty cache is [`TldrError::EmptyDatabase`] and no key is looked up.
/// A page in neither partition is [`TldrError::NotFound`]. `platform` of
/// `None` searches `common` only.
#[instrument(skip(source))]
pub async fn lookup_page<P: PageSource>(
    source: &P,
    command: &str,
    platform: Option<&str>,
) -> Result<Page> {
    if source.is_empty().await? {
        return Err(TldrError::EmptyDatabase);
    }

    for partition in search_order(platform) {
        if let Some(blob) = source.get(partition, command).await? {
            debug!(partition, "page found");
            return Ok(Page {
                partition: partition.to_string(),
                command: command.to_string(),
                text: codec::decode_page(partition, command, &blob)?,
            });
        }
    }

    Err(TldrError::NotFound {
        command: command.to_string(),
    })
}

/// Look up `command` and render it to `out`.
///
/// `styled` selects ANSI rendering; otherwise the page markup is written as is.
pub async fn render_command<P: PageSource, W: Write>(
    source: &P,
    command: &str,
    platform: Option<&str>,
    styled: bool,
    out: W,
) -> Result<Page> {
    let page = lookup_page(source, command, platform).await?;
    tldr_markup::render(&page.text, styled, out).map_err(|e| TldrError::io("<stdout>", e))?;
    Ok(page)
}

/// Every command available for `platform`, sorted and de-duplicated.
pub async fn list_commands<P: PageSource>(source: &P, platform: Option<&str>) -> Result<Vec<String>> {
    if source.is_empty().await? {
        return Err(TldrError::EmptyDatabase);
    }

    let mut commands = BTreeSet::new();
    for partition in search_order(platform) {
        commands.extend(source.list_commands(partition).await?);
    }
    Ok(commands.into_iter().collect())
}
