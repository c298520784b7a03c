use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::resource::domain::video_reader::VideoReader;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

type BoxError = Box<dyn std::error::Error>;

/// Demuxes and decodes the best video stream of a container with
/// ffmpeg-next, converting every picture to packed RGB24.
#[derive(Default)]
pub struct FfmpegReader {
    source: Option<OpenSource>,
}

struct OpenSource {
    input: Input,
    stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn decode(&mut self) -> Result<Decode<'_>, BoxError> {
        let source = self.source.as_mut().ok_or("FfmpegReader: not opened")?;
        let parameters = source
            .input
            .stream(source.stream_index)
            .ok_or("FfmpegReader: video stream disappeared")?
            .parameters();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(parameters)?
            .decoder()
            .video()?;
        let to_rgb = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )?;
        Ok(Decode {
            stream_index: source.stream_index,
            input: &mut source.input,
            decoder,
            to_rgb,
            next_index: 0,
            phase: Phase::Reading,
        })
    }
}

/// Average frame rate, falling back to the stream's base rate.
fn frame_rate(stream: &ffmpeg_next::format::stream::Stream<'_>) -> f64 {
    [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find(|r| r.numerator() != 0 && r.denominator() != 0)
        .map(f64::from)
        .unwrap_or(0.0)
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
        ffmpeg_next::init()?;
        let input = ffmpeg_next::format::input(path)?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream in container")?;
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps: frame_rate(&stream),
            total_frames: usize::try_from(stream.frames()).unwrap_or(0),
            codec: decoder.codec().map(|c| c.name().to_string()).unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };
        let stream_index = stream.index();
        log::debug!(
            "Opened {} ({}x{} {}, {:.2} fps)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata.fps
        );
        self.source = Some(OpenSource { input, stream_index });
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
        match self.decode() {
            Ok(decode) => Box::new(decode),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.source = None;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Draining,
    Finished,
}

/// One pass over the open stream, decoding lazily.
struct Decode<'a> {
    input: &'a mut Input,
    stream_index: usize,
    decoder: ffmpeg_next::decoder::Video,
    to_rgb: scaling::Context,
    next_index: usize,
    phase: Phase,
}

impl Decode<'_> {
    /// The next picture the decoder has ready, if any.
    fn receive(&mut self) -> Option<Result<Frame, BoxError>> {
        let mut decoded = Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;
        let mut rgb = Video::empty();
        if let Err(e) = self.to_rgb.run(&decoded, &mut rgb) {
            return Some(Err(e.into()));
        }
        let frame = Frame::new(
            packed_rgb(&rgb),
            rgb.width(),
            rgb.height(),
            3,
            self.next_index,
        );
        self.next_index += 1;
        Some(Ok(frame))
    }

    /// Feeds packets until the decoder produces a picture or input runs out.
    fn feed(&mut self) -> Option<Result<Frame, BoxError>> {
        while let Some((stream, packet)) = self.input.packets().next() {
            if stream.index() != self.stream_index || self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(frame) = self.receive() {
                return Some(frame);
            }
        }
        // Best effort: a decoder that rejects EOF has nothing buffered.
        let _ = self.decoder.send_eof();
        self.phase = Phase::Draining;
        self.receive()
    }
}

impl Iterator for Decode<'_> {
    type Item = Result<Frame, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match self.phase {
            Phase::Finished => None,
            Phase::Reading => self.receive().or_else(|| self.feed()),
            Phase::Draining => self.receive(),
        };
        if next.is_none() {
            self.phase = Phase::Finished;
        }
        next
    }
}

/// Row-by-row copy that drops ffmpeg's line padding.
fn packed_rgb(rgb: &Video) -> Vec<u8> {
    let row_len = rgb.width() as usize * 3;
    rgb.data(0)
        .chunks(rgb.stride(0))
        .take(rgb.height() as usize)
        .flat_map(|row| &row[..row_len])
        .copied()
        .collect()
}
