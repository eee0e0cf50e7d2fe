//! Page blob encoding.
//!
//! Pages are stored LZ4-compressed with the uncompressed length prepended,
//! so decompression needs no side information.

use tldr_shared::{Result, TldrError};

/// Compress raw page bytes for storage.
pub fn compress(page: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(page)
}

/// Exact inverse of [`compress`].
pub fn decompress(blob: &[u8]) -> std::result::Result<Vec<u8>, lz4_flex::block::DecompressError> {
    lz4_flex::decompress_size_prepended(blob)
}

/// Decompress a stored blob into page text.
///
/// Any failure is [`TldrError::Corrupt`] naming the page it came from.
pub fn decode_page(partition: &str, command: &str, blob: &[u8]) -> Result<String> {
    let corrupt = |reason: String| TldrError::Corrupt {
        partition: partition.to_string(),
        command: command.to_string(),
        reason,
    };

    let bytes = decompress(blob).map_err(|e| corrupt(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| corrupt(format!("page is not UTF-8: {e}")))
}
