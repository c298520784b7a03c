use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::capture::domain::artifact_exporter::ArtifactExporter;
use crate::capture::domain::capture_session::Artifact;
use crate::shared::constants::EXPORT_RELEASE_GRACE;

/// Saves artifacts into a download directory.
///
/// The bytes are first materialized as a transient temp file, which is then
/// copied to `<output_dir>/<file_name>`. The transient file is released on a
/// helper thread once the grace period has passed.
pub struct DownloadExporter {
    output_dir: PathBuf,
    grace: Duration,
    releases: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_grace(output_dir, EXPORT_RELEASE_GRACE)
    }

    pub fn with_grace(output_dir: impl Into<PathBuf>, grace: Duration) -> Self {
        Self {
            output_dir: output_dir.into(),
            grace,
            releases: Mutex::new(Vec::new()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Blocks until every transient file has been released.
    pub fn wait_for_releases(&self) {
        let handles: Vec<_> = self
            .releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("Transient export release thread panicked");
            }
        }
    }
}

impl Drop for DownloadExporter {
    fn drop(&mut self) {
        self.wait_for_releases();
    }
}

impl ArtifactExporter for DownloadExporter {
    fn export(&self, artifact: &Artifact, file_name: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(&self.output_dir)?;

        let mut transient = tempfile::Builder::new().prefix("posecast-export-").tempfile()?;
        transient.write_all(&artifact.bytes)?;
        transient.flush()?;

        let target = self.output_dir.join(file_name);
        std::fs::copy(transient.path(), &target)?;
        log::info!(
            "Exported {} ({} bytes, {} chunks, {}) to {}",
            file_name,
            artifact.bytes.len(),
            artifact.chunk_count,
            artifact.mime_type,
            target.display()
        );

        let grace = self.grace;
        let release = std::thread::spawn(move || {
            std::thread::sleep(grace);
            if let Err(e) = transient.close() {
                log::warn!("Failed to release transient export file: {e}");
            }
        });
        self.releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(release);

        Ok(target)
    }
}
