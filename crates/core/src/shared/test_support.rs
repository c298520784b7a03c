//! Fakes shared by the unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use crate::capture::domain::artifact_exporter::ArtifactExporter;
use crate::capture::domain::capture_session::Artifact;
use crate::capture::domain::stream_recorder::{RecorderFactory, RecorderProfile, StreamFormat, StreamRecorder};
use crate::config::config_cell::ConfigReader;
use crate::config::overlay_config::{Architecture, OutputStride};
use crate::estimation::domain::body_part::BodyPart;
use crate::estimation::domain::pose::{Keypoint, Pose, Position};
use crate::estimation::domain::pose_net::{InferenceError, MultiPoseParams, PoseNet, PoseNetLoader};
use crate::pipeline::estimation_loop::{FrameTap, RenderedFrame, TapControl};
use crate::resource::domain::byte_source::{ByteSource, SourceBytes};
use crate::resource::domain::media_event::{EventSink, MediaEvent};
use crate::resource::domain::media_platform::{MediaPlatform, VideoElement};
use crate::resource::domain::video_reader::VideoReader;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

type BoxError = Box<dyn std::error::Error>;

/// Encodes `n_frames` grey MPEG-4 frames to `dir/test.mp4`.
pub fn write_test_video(dir: &Path, n_frames: usize, width: u32, height: u32, fps: i32) -> PathBuf {
    let path = dir.join("test.mp4");
    ffmpeg_next::init().unwrap();
    let mut octx = ffmpeg_next::format::output(&path).unwrap();
    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

    let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
    let mut ost = octx.add_stream(Some(codec)).unwrap();
    let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .unwrap();
    encoder_ctx.set_width(width);
    encoder_ctx.set_height(height);
    encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
    encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps));
    encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps, 1)));
    if global_header {
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }
    let mut encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new()).unwrap();
    ost.set_parameters(&encoder);
    octx.write_header().unwrap();
    let ost_time_base = octx.stream(0).unwrap().time_base();

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::format::Pixel::YUV420P,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .unwrap();

    let drain = |encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
                     octx: &mut ffmpeg_next::format::context::Output| {
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
            encoded.write_interleaved(octx).unwrap();
        }
    };

    for i in 0..n_frames {
        let mut rgb_frame =
            ffmpeg_next::util::frame::video::Video::new(ffmpeg_next::format::Pixel::RGB24, width, height);
        let stride = rgb_frame.stride(0);
        let value = ((i * 40) % 256) as u8;
        let data = rgb_frame.data_mut(0);
        for row in 0..height as usize {
            let start = row * stride;
            data[start..start + width as usize * 3].fill(value);
        }
        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
        yuv_frame.set_pts(Some(i as i64));
        encoder.send_frame(&yuv_frame).unwrap();
        drain(&mut encoder, &mut octx);
    }
    encoder.send_eof().unwrap();
    drain(&mut encoder, &mut octx);
    octx.write_trailer().unwrap();
    path
}

pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// Pose with every keypoint at the same confidence, spread over the frame.
pub fn full_pose(score: f32, confidence: f32) -> Pose {
    Pose {
        score,
        keypoints: BodyPart::ALL
            .iter()
            .enumerate()
            .map(|(i, &part)| Keypoint {
                part,
                position: Position::new(2.0 + i as f32, 1.0 + (i % 5) as f32 * 4.0),
                confidence,
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Video decoding

/// Yields `frames` solid frames whose first byte is their index.
pub struct StubVideoReader {
    frames: usize,
    width: u32,
    height: u32,
    fail_open: bool,
}

impl StubVideoReader {
    pub fn new(frames: usize, width: u32, height: u32) -> Self {
        Self {
            frames,
            width,
            height,
            fail_open: false,
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(0, 1, 1)
        }
    }
}

impl VideoReader for StubVideoReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
        if self.fail_open {
            return Err("stub: unreadable container".into());
        }
        Ok(VideoMetadata {
            width: self.width,
            height: self.height,
            fps: 25.0,
            total_frames: self.frames,
            codec: "stub".into(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
        let (width, height) = (self.width, self.height);
        Box::new((0..self.frames).map(move |i| Ok(Frame::filled(width, height, [i as u8, 0, 0], i))))
    }

    fn close(&mut self) {}
}

// ---------------------------------------------------------------------------
// Byte sources

pub struct MemorySource {
    result: Option<SourceBytes>,
    fetches: Cell<usize>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>, mime_type: &str, token: &str) -> Self {
        Self {
            result: Some(SourceBytes {
                bytes,
                mime_type: mime_type.into(),
                token: token.into(),
            }),
            fetches: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: None,
            fetches: Cell::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl ByteSource for MemorySource {
    fn fetch(&self) -> Result<SourceBytes, BoxError> {
        self.fetches.set(self.fetches.get() + 1);
        self.result.clone().ok_or_else(|| "connection refused".into())
    }
}

// ---------------------------------------------------------------------------
// Media platform

pub const SCRIPTED_WIDTH: u32 = 8;
pub const SCRIPTED_HEIGHT: u32 = 6;

#[derive(Clone, Debug, Default)]
pub struct ElementLog {
    pub binds: usize,
    pub pauses: usize,
    pub detaches: usize,
    pub looping: Option<bool>,
    pub sinks: Vec<EventSink>,
}

#[derive(Default)]
struct PlatformState {
    readiness: VecDeque<Vec<MediaEvent>>,
    fail_binds: bool,
    fail_decode_at: Option<usize>,
    log: ElementLog,
}

/// Media platform whose video elements report scripted readiness
/// synchronously and play `frames` synthetic frames.
#[derive(Clone)]
pub struct ScriptedPlatform {
    frames: usize,
    state: Arc<Mutex<PlatformState>>,
}

impl ScriptedPlatform {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            state: Arc::default(),
        }
    }

    /// Queues the readiness events for the next bind or reload. Unscripted
    /// loads report `CanPlay` then `CanPlayThrough`.
    pub fn script_readiness(&self, events: Vec<MediaEvent>) {
        self.state.lock().unwrap().readiness.push_back(events);
    }

    pub fn fail_binds(&self) {
        self.state.lock().unwrap().fail_binds = true;
    }

    /// Decoding the frame at `position` fails.
    pub fn fail_decode_at(&self, position: usize) {
        self.state.lock().unwrap().fail_decode_at = Some(position);
    }

    pub fn log(&self) -> ElementLog {
        self.state.lock().unwrap().log.clone()
    }
}

impl MediaPlatform for ScriptedPlatform {
    fn decode_image(&self, bytes: &[u8]) -> Result<Frame, BoxError> {
        Ok(Frame::from_rgb_image(image::load_from_memory(bytes)?.to_rgb8(), 0))
    }

    fn create_video_element(&self) -> Box<dyn VideoElement> {
        Box::new(ScriptedElement {
            frames: self.frames,
            state: Arc::clone(&self.state),
            sink: None,
            position: 0,
            playing: false,
            looping: false,
            ended: false,
            current: None,
        })
    }
}

struct ScriptedElement {
    frames: usize,
    state: Arc<Mutex<PlatformState>>,
    sink: Option<EventSink>,
    position: usize,
    playing: bool,
    looping: bool,
    ended: bool,
    current: Option<Frame>,
}

impl ScriptedElement {
    fn attach(&mut self, sink: EventSink) {
        let readiness = {
            let mut state = self.state.lock().unwrap();
            state.log.sinks.push(sink.clone());
            state
                .readiness
                .pop_front()
                .unwrap_or_else(|| vec![MediaEvent::CanPlay, MediaEvent::CanPlayThrough])
        };
        self.position = 0;
        self.playing = false;
        self.ended = false;
        self.current = None;
        for event in readiness {
            sink.emit(event);
        }
        self.sink = Some(sink);
    }
}

impl VideoElement for ScriptedElement {
    fn bind_source(&mut self, _bytes: Vec<u8>, _mime_type: &str, sink: EventSink) -> Result<(), BoxError> {
        {
            let mut state = self.state.lock().unwrap();
            state.log.binds += 1;
            if state.fail_binds {
                return Err("scripted bind failure".into());
            }
        }
        self.attach(sink);
        Ok(())
    }

    fn has_source(&self) -> bool {
        self.sink.is_some()
    }

    fn load(&mut self, sink: EventSink) -> Result<(), BoxError> {
        if self.sink.is_none() {
            return Err("no source bound".into());
        }
        self.attach(sink);
        Ok(())
    }

    fn play(&mut self) {
        if self.ended {
            self.ended = false;
            self.position = 0;
        }
        self.playing = true;
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().log.pauses += 1;
        self.playing = false;
    }

    fn set_looping(&mut self, looping: bool) {
        self.state.lock().unwrap().log.looping = Some(looping);
        self.looping = looping;
    }

    fn detach(&mut self) {
        self.state.lock().unwrap().log.detaches += 1;
        self.sink = None;
        self.playing = false;
        self.current = None;
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, BoxError> {
        let Some(sink) = &self.sink else {
            return Ok(None);
        };
        if !self.playing {
            return Ok(self.current.clone());
        }
        if self.position >= self.frames {
            if self.looping && self.frames > 0 {
                self.position = 0;
            } else {
                if !self.ended {
                    self.ended = true;
                    self.playing = false;
                    sink.emit(MediaEvent::Ended);
                }
                return Ok(None);
            }
        }
        let index = self.position;
        if self.state.lock().unwrap().fail_decode_at == Some(index) {
            return Err("scripted decode failure".into());
        }
        let frame = Frame::filled(SCRIPTED_WIDTH, SCRIPTED_HEIGHT, [(index * 40 % 256) as u8, 0, 0], index);
        self.position += 1;
        self.current = Some(frame.clone());
        Ok(Some(frame))
    }

    fn metadata(&mut self) -> Option<VideoMetadata> {
        self.sink.as_ref().map(|_| VideoMetadata {
            width: SCRIPTED_WIDTH,
            height: SCRIPTED_HEIGHT,
            fps: 25.0,
            total_frames: self.frames,
            codec: "scripted".into(),
            source_path: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Pose estimation

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SingleCall {
    pub scale: f32,
    pub flip: bool,
    pub stride: OutputStride,
}

#[derive(Clone, Debug, Default)]
pub struct LoaderLog {
    pub loads: Vec<Architecture>,
    pub disposed: Vec<Architecture>,
    /// Architecture of the net that served each estimate.
    pub served_by: Vec<Architecture>,
    pub single_calls: Vec<SingleCall>,
    pub multi_calls: Vec<MultiPoseParams>,
    /// Swap flag seen on the observed config during each load.
    pub swap_flag_at_load: Vec<bool>,
}

#[derive(Default)]
struct LoaderState {
    log: LoaderLog,
    estimates: usize,
}

/// Loads nets that return a fixed pose list.
#[derive(Clone)]
pub struct ScriptedLoader {
    poses: Vec<Pose>,
    failing_for: Vec<Architecture>,
    fail_after: Option<usize>,
    observed: Arc<Mutex<Option<ConfigReader>>>,
    state: Arc<Mutex<LoaderState>>,
}

impl ScriptedLoader {
    pub fn returning(poses: Vec<Pose>) -> Self {
        Self {
            poses,
            failing_for: Vec::new(),
            fail_after: None,
            observed: Arc::default(),
            state: Arc::default(),
        }
    }

    /// Samples `config`'s swap flag on every later load, in all clones.
    pub fn observe(&self, config: ConfigReader) {
        *self.observed.lock().unwrap() = Some(config);
    }

    pub fn failing_for(mut self, architecture: Architecture) -> Self {
        self.failing_for.push(architecture);
        self
    }

    /// Estimates beyond the first `n` (across all nets) fail.
    pub fn failing_estimates_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn log(&self) -> LoaderLog {
        self.state.lock().unwrap().log.clone()
    }
}

impl PoseNetLoader for ScriptedLoader {
    fn load(&self, architecture: Architecture) -> Result<Box<dyn PoseNet>, InferenceError> {
        let swap_flag = self
            .observed
            .lock()
            .unwrap()
            .as_ref()
            .map(|config| config.snapshot().swap_in_progress);
        let mut state = self.state.lock().unwrap();
        state.log.loads.push(architecture);
        state.log.swap_flag_at_load.extend(swap_flag);
        drop(state);
        if self.failing_for.contains(&architecture) {
            return Err(InferenceError::Load {
                architecture,
                reason: "scripted load failure".into(),
            });
        }
        Ok(Box::new(ScriptedPoseNet {
            architecture,
            poses: self.poses.clone(),
            fail_after: self.fail_after,
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct ScriptedPoseNet {
    architecture: Architecture,
    poses: Vec<Pose>,
    fail_after: Option<usize>,
    state: Arc<Mutex<LoaderState>>,
}

impl ScriptedPoseNet {
    fn serve(&self, state: &mut LoaderState) -> Result<(), InferenceError> {
        state.estimates += 1;
        if self.fail_after.is_some_and(|n| state.estimates > n) {
            return Err(InferenceError::estimate("scripted inference failure"));
        }
        state.log.served_by.push(self.architecture);
        Ok(())
    }
}

impl PoseNet for ScriptedPoseNet {
    fn estimate_single(
        &mut self,
        _frame: &Frame,
        image_scale_factor: f32,
        flip_horizontal: bool,
        output_stride: OutputStride,
    ) -> Result<Pose, InferenceError> {
        let mut state = self.state.lock().unwrap();
        state.log.single_calls.push(SingleCall {
            scale: image_scale_factor,
            flip: flip_horizontal,
            stride: output_stride,
        });
        self.serve(&mut state)?;
        Ok(self.poses.first().cloned().unwrap_or(Pose {
            score: 0.0,
            keypoints: Vec::new(),
        }))
    }

    fn estimate_multi(
        &mut self,
        _frame: &Frame,
        _image_scale_factor: f32,
        _flip_horizontal: bool,
        _output_stride: OutputStride,
        params: &MultiPoseParams,
    ) -> Result<Vec<Pose>, InferenceError> {
        let mut state = self.state.lock().unwrap();
        state.log.multi_calls.push(*params);
        self.serve(&mut state)?;
        Ok(self.poses.clone())
    }

    fn dispose(self: Box<Self>) {
        self.state.lock().unwrap().log.disposed.push(self.architecture);
    }
}

// ---------------------------------------------------------------------------
// Loop taps

#[derive(Default)]
pub struct RecordingTap {
    pub frames: usize,
    pub events: Vec<MediaEvent>,
    pub pose_counts: Vec<usize>,
    stop_after: Option<usize>,
}

impl RecordingTap {
    pub fn stopping_after(frames: usize) -> Self {
        Self {
            stop_after: Some(frames),
            ..Self::default()
        }
    }
}

impl FrameTap for RecordingTap {
    fn on_frame(&mut self, rendered: &RenderedFrame<'_>) -> TapControl {
        self.frames += 1;
        self.pose_counts.push(rendered.poses.len());
        match self.stop_after {
            Some(n) if self.frames >= n => TapControl::Stop,
            _ => TapControl::Continue,
        }
    }

    fn on_events(&mut self, events: &[MediaEvent]) -> TapControl {
        self.events.extend_from_slice(events);
        TapControl::Continue
    }
}

// ---------------------------------------------------------------------------
// Capture

#[derive(Clone, Debug, Default)]
pub struct RecorderLog {
    pub started: Vec<StreamFormat>,
    pub recorded: usize,
    pub stopped: usize,
}

/// Accepts only the listed MIME types. Its recorders emit one single-byte
/// chunk per frame (the running frame count) and an empty chunk on stop.
#[derive(Clone)]
pub struct ScriptedRecorderFactory {
    supported: Vec<String>,
    fail_records: bool,
    log: Arc<Mutex<RecorderLog>>,
}

impl ScriptedRecorderFactory {
    pub fn supporting(mime_types: &[&str]) -> Self {
        Self {
            supported: mime_types.iter().map(|m| m.to_string()).collect(),
            fail_records: false,
            log: Arc::default(),
        }
    }

    pub fn failing_records(mut self) -> Self {
        self.fail_records = true;
        self
    }

    pub fn log(&self) -> RecorderLog {
        self.log.lock().unwrap().clone()
    }
}

impl RecorderFactory for ScriptedRecorderFactory {
    fn create(&self, profile: &RecorderProfile) -> Result<Box<dyn StreamRecorder>, BoxError> {
        if !self.supported.iter().any(|m| m == profile.mime_type) {
            return Err(format!("{} is not supported", profile.mime_type).into());
        }
        Ok(Box::new(ScriptedRecorder {
            mime_type: profile.mime_type,
            fail_records: self.fail_records,
            chunks: None,
            count: 0,
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedRecorder {
    mime_type: &'static str,
    fail_records: bool,
    chunks: Option<Sender<Vec<u8>>>,
    count: usize,
    log: Arc<Mutex<RecorderLog>>,
}

impl StreamRecorder for ScriptedRecorder {
    fn mime_type(&self) -> &str {
        self.mime_type
    }

    fn start(&mut self, format: StreamFormat, chunks: Sender<Vec<u8>>) -> Result<(), BoxError> {
        self.log.lock().unwrap().started.push(format);
        self.chunks = Some(chunks);
        Ok(())
    }

    fn record(&mut self, _frame: &Frame) -> Result<(), BoxError> {
        if self.fail_records {
            return Err("scripted encoder failure".into());
        }
        let chunks = self.chunks.as_ref().ok_or("not started")?;
        self.count += 1;
        self.log.lock().unwrap().recorded += 1;
        let _ = chunks.send(vec![self.count as u8]);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        if let Some(chunks) = self.chunks.take() {
            self.log.lock().unwrap().stopped += 1;
            let _ = chunks.send(Vec::new());
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryExporter {
    exported: Arc<Mutex<Vec<(String, Artifact)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryExporter {
    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn exported(&self) -> Vec<(String, Artifact)> {
        self.exported.lock().unwrap().clone()
    }
}

impl ArtifactExporter for MemoryExporter {
    fn export(&self, artifact: &Artifact, file_name: &str) -> Result<PathBuf, BoxError> {
        if *self.fail.lock().unwrap() {
            return Err("disk full".into());
        }
        self.exported
            .lock()
            .unwrap()
            .push((file_name.to_string(), artifact.clone()));
        Ok(PathBuf::from(file_name))
    }
}
