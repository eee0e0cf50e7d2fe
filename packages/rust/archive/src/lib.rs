//! Page archive retrieval and decoding.
//!
//! This crate provides:
//! - [`ArchiveSource`] / [`HttpSource`]: fetch the upstream zip as bytes
//! - [`PageArchive`]: decoded archive exposing `(path, bytes)` entries

pub mod fetch;
mod pages;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use fetch::{ArchiveSource, HttpSource};
pub use pages::PageArchive;
