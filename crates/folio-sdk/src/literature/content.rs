//! Locally materialized content
//!
//! Relay-fetched bytes are written to a temp file so renderers can address
//! them by path or `file://` URL. The file is removed when the handle drops;
//! the cache holds handles behind `Arc`, so eviction releases the file once
//! no reader still holds it.

use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Handle to content materialized on local disk
#[derive(Debug)]
pub struct ContentHandle {
    source: String,
    file: NamedTempFile,
    len: u64,
}

impl ContentHandle {
    /// Write `bytes` to a new temp file, in `dir` if given
    pub fn materialize(source: &str, bytes: &[u8], dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("folio-content-").suffix(".pdf");

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;

        debug!(source = source, path = %file.path().display(), size = bytes.len(), "Content materialized");

        Ok(Self {
            source: source.to_string(),
            file,
            len: bytes.len() as u64,
        })
    }

    /// URL the content was fetched from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.file.path().display())
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the content back
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.file.path())?)
    }
}

impl Drop for ContentHandle {
    fn drop(&mut self) {
        debug!(source = %self.source, path = %self.file.path().display(), "Releasing content handle");
    }
}
