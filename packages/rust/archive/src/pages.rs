//! Read access to a downloaded zip archive of pages.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use tldr_shared::{Result, TldrError};

/// A decoded page archive held in memory.
pub struct PageArchive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl PageArchive {
    /// Decode `bytes` as a zip archive. Malformed input is [`TldrError::Archive`].
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| TldrError::Archive(format!("failed to read zip archive: {e}")))?;
        Ok(Self { zip })
    }

    /// Paths of all file entries.
    pub fn paths(&self) -> Vec<String> {
        self.zip
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    /// Read the full contents of the entry at `path`.
    ///
    /// Errors are per entry; the rest of the archive stays readable.
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut entry = self
            .zip
            .by_name(path)
            .map_err(|e| TldrError::Archive(format!("{path}: {e}")))?;

        let mut out = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut out)
            .map_err(|e| TldrError::Archive(format!("{path}: {e}")))?;
        Ok(out)
    }
}
