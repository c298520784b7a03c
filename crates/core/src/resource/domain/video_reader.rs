use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Decodes a video container into RGB frames.
///
/// A video element owns one reader per playback pass and runs it on its
/// decode thread, hence `Send`.
pub trait VideoReader: Send {
    /// Opens the container and reports its stream properties.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Frames in presentation order, starting from the first.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
