use std::path::{Path, PathBuf};

use crate::resource::domain::byte_source::{mime_for_extension, ByteSource, SourceBytes};

/// Reads a local media file; the MIME type comes from its extension.
pub struct FileByteSource {
    path: PathBuf,
}

impl FileByteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileByteSource {
    fn fetch(&self) -> Result<SourceBytes, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| format!("failed to read {}: {e}", self.path.display()))?;
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Ok(SourceBytes {
            bytes,
            mime_type: mime_for_extension(extension).to_string(),
            token: self.path.display().to_string(),
        })
    }
}
