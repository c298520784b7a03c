use std::sync::Arc;

use crate::resource::domain::media_platform::{MediaPlatform, VideoElement};
use crate::resource::domain::video_reader::VideoReader;
use crate::shared::frame::Frame;

use super::decoding_video_element::{DecodingVideoElement, ReaderFactory};
use super::ffmpeg_reader::FfmpegReader;

/// Media platform backed by the `image` crate for stills and ffmpeg for
/// video.
pub struct DecodingMediaPlatform {
    reader_factory: ReaderFactory,
}

impl DecodingMediaPlatform {
    pub fn new() -> Self {
        Self::with_reader_factory(Arc::new(|| Box::new(FfmpegReader::new()) as Box<dyn VideoReader>))
    }

    pub fn with_reader_factory(reader_factory: ReaderFactory) -> Self {
        Self { reader_factory }
    }
}

impl Default for DecodingMediaPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaPlatform for DecodingMediaPlatform {
    fn decode_image(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Frame::from_rgb_image(decoded.to_rgb8(), 0))
    }

    fn create_video_element(&self) -> Box<dyn VideoElement> {
        Box::new(DecodingVideoElement::new(Arc::clone(&self.reader_factory)))
    }
}
