//! Update pipeline and lookup driver for the tldr page cache.
//!
//! This crate ties the archive fetcher, the libSQL page store and the markup
//! renderer together:
//! - [`update::update`]: replace the cache from the upstream archive
//! - [`lookup::lookup_page`] / [`lookup::render_command`]: platform then `common`
//! - [`codec`]: compressed page blobs

pub mod codec;
pub mod lookup;
pub mod update;

pub use lookup::{Page, PageSource, list_commands, lookup_page, render_command};
pub use update::{ProgressReporter, SilentProgress, UpdateReport, route_entry, update};
