use std::path::PathBuf;

use super::capture_session::Artifact;

/// Hands a finished artifact to the user. Returns where it ended up.
pub trait ArtifactExporter {
    fn export(&self, artifact: &Artifact, file_name: &str) -> Result<PathBuf, Box<dyn std::error::Error>>;
}
