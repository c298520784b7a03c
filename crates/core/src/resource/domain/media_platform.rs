use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

use super::media_event::EventSink;

/// The environment's media stack: a still-image decoder and a factory for
/// video playback elements.
pub trait MediaPlatform: Send {
    fn decode_image(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>>;

    fn create_video_element(&self) -> Box<dyn VideoElement>;
}

/// A reusable video playback element.
///
/// Readiness (`CanPlay`, `CanPlayThrough`), `Ended` and failures are reported
/// asynchronously through the [`EventSink`] passed to the most recent
/// `bind_source` or `load`. Starting a new load silences the previous sink.
pub trait VideoElement: Send {
    /// Binds new source bytes and starts loading them from the beginning.
    fn bind_source(
        &mut self,
        bytes: Vec<u8>,
        mime_type: &str,
        sink: EventSink,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn has_source(&self) -> bool;

    /// Reloads the bound source from the start. Playback is paused and
    /// readiness is reported again.
    fn load(&mut self, sink: EventSink) -> Result<(), Box<dyn std::error::Error>>;

    fn play(&mut self);

    fn pause(&mut self);

    fn set_looping(&mut self, looping: bool);

    /// Drops the sink and releases the source binding.
    fn detach(&mut self);

    /// While playing, blocks until the next frame is decoded. While paused,
    /// returns the frame last shown. `None` once playback has ended (after
    /// `Ended` is reported) or before any frame is available.
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    fn metadata(&mut self) -> Option<VideoMetadata>;
}
