//! In-memory archive builders and sources for tests.

use std::io::{Cursor, Write};

use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use tldr_shared::{Result, TldrError};

use crate::ArchiveSource;

/// Build a zip archive holding `files`, stored uncompressed.
pub fn build_zip(files: &[(&str, &str)]) -> Vec<u8> {
    build_zip_with_dirs(&[], files)
}

/// Build a zip archive with explicit directory entries followed by `files`.
pub fn build_zip_with_dirs(dirs: &[&str], files: &[(&str, &str)]) -> Vec<u8> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for dir in dirs {
        writer.add_directory(*dir, options).expect("add directory");
    }
    for (path, content) in files {
        writer.start_file(*path, options).expect("start file");
        writer.write_all(content.as_bytes()).expect("write file");
    }

    writer.finish().expect("finish zip").into_inner()
}

/// Flip the first byte of the stored copy of `content` so its CRC no longer matches.
pub fn corrupt_content(archive: &mut [u8], content: &str) {
    let needle = content.as_bytes();
    let offset = archive
        .windows(needle.len())
        .position(|window| window == needle)
        .expect("content present in archive");
    archive[offset] ^= 0xFF;
}

/// An [`ArchiveSource`] serving fixed bytes.
pub struct StaticSource(pub Vec<u8>);

impl ArchiveSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// An [`ArchiveSource`] whose fetch always fails.
pub struct FailingSource;

impl ArchiveSource for FailingSource {
    async fn fetch(&self) -> Result<Vec<u8>> {
        Err(TldrError::Fetch("connection refused".into()))
    }

    fn location(&self) -> String {
        "unreachable".to_string()
    }
}
