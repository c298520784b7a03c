use std::path::Path;

use crate::shared::frame::Frame;

/// Writes a rendered surface to an image file.
pub trait SnapshotWriter: Send {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
