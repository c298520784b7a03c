use std::time::Duration;

use crossbeam_channel::Sender;

use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    Vp8,
    Vp9,
}

/// One encoder configuration a recorder can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecorderProfile {
    pub mime_type: &'static str,
    pub codec: VideoCodec,
    /// File extension of the exported artifact.
    pub extension: &'static str,
}

/// Profiles tried, in order, when a capture starts.
pub const NEGOTIATION_ORDER: [RecorderProfile; 3] = [
    RecorderProfile {
        mime_type: "video/webm",
        codec: VideoCodec::Vp8,
        extension: "webm",
    },
    RecorderProfile {
        mime_type: "video/webm;codecs=vp9",
        codec: VideoCodec::Vp9,
        extension: "webm",
    },
    RecorderProfile {
        mime_type: "video/vp8",
        codec: VideoCodec::Vp8,
        extension: "webm",
    },
];

/// Stream properties a recorder is started with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Encoded media duration per delivered chunk.
    pub timeslice: Duration,
}

/// Encodes the surface stream into container chunks.
///
/// Chunks go out over the sender handed to `start`, in the order their
/// bytes belong in the artifact. `stop` flushes the encoder, delivers what
/// remains and drops the sender, so the receiving side sees a disconnect
/// once every chunk has arrived.
pub trait StreamRecorder: Send {
    fn mime_type(&self) -> &str;

    fn start(
        &mut self,
        format: StreamFormat,
        chunks: Sender<Vec<u8>>,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn record(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Constructs recorders for a profile, failing when the environment lacks
/// the encoder.
pub trait RecorderFactory {
    fn create(
        &self,
        profile: &RecorderProfile,
    ) -> Result<Box<dyn StreamRecorder>, Box<dyn std::error::Error>>;
}

/// Tries each profile in [`NEGOTIATION_ORDER`]. On failure returns the MIME
/// types that were attempted.
pub fn negotiate(
    factory: &dyn RecorderFactory,
) -> Result<(RecorderProfile, Box<dyn StreamRecorder>), Vec<String>> {
    let mut tried = Vec::with_capacity(NEGOTIATION_ORDER.len());
    for profile in NEGOTIATION_ORDER {
        match factory.create(&profile) {
            Ok(recorder) => {
                log::info!("Created recorder for {}", profile.mime_type);
                return Ok((profile, recorder));
            }
            Err(e) => {
                log::warn!("Unable to create recorder for {}: {e}", profile.mime_type);
                tried.push(profile.mime_type.to_string());
            }
        }
    }
    Err(tried)
}
