use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::resource::domain::media_event::{EventSink, MediaEvent};
use crate::resource::domain::media_platform::VideoElement;
use crate::resource::domain::video_reader::VideoReader;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Builds a fresh reader for each playback pass.
pub type ReaderFactory = Arc<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;

enum DecodeMsg {
    Frame(Frame),
    EndOfStream,
    Failed(String),
}

struct DecodeThread {
    frames: Receiver<DecodeMsg>,
    metadata: Receiver<VideoMetadata>,
    cancelled: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

impl DecodeThread {
    /// Stops decoding and waits for the thread, so nothing it emits can
    /// arrive after this returns.
    fn shutdown(self) {
        self.cancelled.store(true, Ordering::Relaxed);
        drop(self.frames);
        if self.handle.join().is_err() {
            log::warn!("Video decode thread panicked");
        }
    }
}

/// Video element that decodes the bound bytes on a helper thread.
///
/// The bytes are spilled to a temporary file for the reader. Frames arrive
/// over a bounded channel; readiness and failures go to the event sink.
pub struct DecodingVideoElement {
    reader_factory: ReaderFactory,
    channel_capacity: usize,
    source: Option<tempfile::NamedTempFile>,
    sink: Option<EventSink>,
    decode: Option<DecodeThread>,
    metadata: Option<VideoMetadata>,
    current: Option<Frame>,
    playing: bool,
    looping: bool,
    ended: bool,
}

impl DecodingVideoElement {
    pub fn new(reader_factory: ReaderFactory) -> Self {
        Self {
            reader_factory,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            source: None,
            sink: None,
            decode: None,
            metadata: None,
            current: None,
            playing: false,
            looping: false,
            ended: false,
        }
    }

    fn stop_decoding(&mut self) {
        if let Some(decode) = self.decode.take() {
            decode.shutdown();
        }
    }

    fn start_decoding(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.stop_decoding();
        let path = self
            .source
            .as_ref()
            .ok_or("no source bound")?
            .path()
            .to_path_buf();
        let sink = self.sink.clone().ok_or("no event sink")?;
        self.decode = Some(spawn_decoder(
            Arc::clone(&self.reader_factory),
            path,
            sink,
            self.channel_capacity,
        ));
        self.current = None;
        self.ended = false;
        Ok(())
    }

    fn recv(&mut self) -> DecodeMsg {
        match self.decode.as_ref().map(|d| d.frames.recv()) {
            Some(Ok(msg)) => msg,
            // A vanished decoder means there is nothing more to show.
            Some(Err(_)) | None => DecodeMsg::EndOfStream,
        }
    }

    fn finish(&mut self) -> Option<Frame> {
        self.playing = false;
        if !self.ended {
            self.ended = true;
            if let Some(sink) = &self.sink {
                sink.emit(MediaEvent::Ended);
            }
        }
        None
    }
}

impl Drop for DecodingVideoElement {
    fn drop(&mut self) {
        self.stop_decoding();
    }
}

impl VideoElement for DecodingVideoElement {
    fn bind_source(
        &mut self,
        bytes: Vec<u8>,
        mime_type: &str,
        sink: EventSink,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.stop_decoding();
        self.playing = false;
        self.metadata = None;

        let suffix = format!(".{}", extension_for_mime(mime_type));
        let mut file = tempfile::Builder::new()
            .prefix("posecast-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&bytes)?;
        file.flush()?;

        self.source = Some(file);
        self.sink = Some(sink);
        self.start_decoding()
    }

    fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn load(&mut self, sink: EventSink) -> Result<(), Box<dyn std::error::Error>> {
        self.stop_decoding();
        self.playing = false;
        self.metadata = None;
        self.sink = Some(sink);
        self.start_decoding()
    }

    fn play(&mut self) {
        if self.ended {
            let sink = self.sink.clone();
            if let Some(sink) = sink {
                if let Err(e) = self.load(sink) {
                    log::warn!("Failed to restart ended video: {e}");
                    return;
                }
            }
        }
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn detach(&mut self) {
        self.stop_decoding();
        self.sink = None;
        self.source = None;
        self.metadata = None;
        self.current = None;
        self.playing = false;
        self.ended = false;
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if !self.playing {
            return Ok(self.current.clone());
        }
        match self.recv() {
            DecodeMsg::Frame(frame) => {
                self.current = Some(frame.clone());
                Ok(Some(frame))
            }
            DecodeMsg::Failed(msg) => {
                self.playing = false;
                Err(msg.into())
            }
            DecodeMsg::EndOfStream => {
                let played_something = self.current.is_some();
                if !(self.looping && played_something) {
                    return Ok(self.finish());
                }
                self.start_decoding()?;
                match self.recv() {
                    DecodeMsg::Frame(frame) => {
                        self.current = Some(frame.clone());
                        Ok(Some(frame))
                    }
                    DecodeMsg::Failed(msg) => {
                        self.playing = false;
                        Err(msg.into())
                    }
                    DecodeMsg::EndOfStream => Ok(self.finish()),
                }
            }
        }
    }

    fn metadata(&mut self) -> Option<VideoMetadata> {
        if self.metadata.is_none() {
            self.metadata = self.decode.as_ref().and_then(|d| d.metadata.try_recv().ok());
        }
        self.metadata.clone()
    }
}

fn spawn_decoder(
    reader_factory: ReaderFactory,
    path: PathBuf,
    sink: EventSink,
    capacity: usize,
) -> DecodeThread {
    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<DecodeMsg>(capacity);
    let (meta_tx, meta_rx) = crossbeam_channel::bounded::<VideoMetadata>(1);
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);

    let handle = std::thread::spawn(move || {
        let mut reader = reader_factory();
        decode_into(&mut *reader, &path, &sink, &frame_tx, &meta_tx, &flag);
        reader.close();
    });

    DecodeThread {
        frames: frame_rx,
        metadata: meta_rx,
        cancelled,
        handle,
    }
}

fn decode_into(
    reader: &mut dyn VideoReader,
    path: &std::path::Path,
    sink: &EventSink,
    frame_tx: &Sender<DecodeMsg>,
    meta_tx: &Sender<VideoMetadata>,
    cancelled: &AtomicBool,
) {
    let metadata = match reader.open(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            if !cancelled.load(Ordering::Relaxed) {
                sink.emit(MediaEvent::Error(e.to_string()));
            }
            let _ = frame_tx.send(DecodeMsg::Failed(e.to_string()));
            return;
        }
    };
    let _ = meta_tx.send(metadata);
    if cancelled.load(Ordering::Relaxed) {
        return;
    }
    sink.emit(MediaEvent::CanPlay);

    let mut ready = false;
    for result in reader.frames() {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }
        match result {
            Ok(frame) => {
                if frame_tx.send(DecodeMsg::Frame(frame)).is_err() {
                    return;
                }
                if !ready {
                    ready = true;
                    sink.emit(MediaEvent::CanPlayThrough);
                }
            }
            Err(e) => {
                sink.emit(MediaEvent::Error(e.to_string()));
                let _ = frame_tx.send(DecodeMsg::Failed(e.to_string()));
                return;
            }
        }
    }

    if cancelled.load(Ordering::Relaxed) {
        return;
    }
    if !ready {
        // An empty stream is still playable: it ends immediately.
        sink.emit(MediaEvent::CanPlayThrough);
    }
    let _ = frame_tx.send(DecodeMsg::EndOfStream);
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        "video/ogg" => "ogv",
        _ => "mp4",
    }
}
