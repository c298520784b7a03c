use std::path::Path;

use crate::rendering::domain::snapshot_writer::SnapshotWriter;
use crate::shared::frame::Frame;

/// Saves surface snapshots with the `image` crate; the format follows the
/// path's extension.
#[derive(Default)]
pub struct PngSnapshotWriter;

impl PngSnapshotWriter {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotWriter for PngSnapshotWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let img = frame
            .to_rgb_image()
            .ok_or("Failed to create image from frame data")?;
        img.save(path)?;
        log::info!("Saved snapshot to {}", path.display());
        Ok(())
    }
}
