use std::path::PathBuf;

/// Stream properties reported by a video decoder once a source is open.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 0 when the container doesn't declare a frame count.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Frame rate to use for playback and encoding; containers that don't
    /// declare one play at 30 fps.
    pub fn playback_fps(&self) -> f64 {
        if self.fps > 0.0 {
            self.fps
        } else {
            30.0
        }
    }
}
