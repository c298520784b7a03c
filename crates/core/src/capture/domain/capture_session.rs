use std::fmt;
use std::str::FromStr;

use crate::config::overlay_config::Algorithm;
use crate::shared::constants::{MULTI_POSE_SUFFIX, OVERLAY_EXPORT_NAME, SKELETON_EXPORT_NAME};

/// What a capture shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayMode {
    /// The skeleton on a blank surface.
    Skeleton,
    /// The skeleton drawn over the mirrored source video.
    SkeletonOverSource,
}

impl OverlayMode {
    /// `(show_video, show_skeleton)` imposed on the output options.
    pub fn output_flags(&self) -> (bool, bool) {
        match self {
            OverlayMode::Skeleton => (false, true),
            OverlayMode::SkeletonOverSource => (true, true),
        }
    }

    pub fn base_name(&self) -> &'static str {
        match self {
            OverlayMode::Skeleton => SKELETON_EXPORT_NAME,
            OverlayMode::SkeletonOverSource => OVERLAY_EXPORT_NAME,
        }
    }

    /// `<base>[-multi]`, the suffix reflecting the algorithm at capture start.
    pub fn output_name(&self, algorithm: Algorithm) -> String {
        match algorithm {
            Algorithm::MultiPose => format!("{}{MULTI_POSE_SUFFIX}", self.base_name()),
            Algorithm::SinglePose => self.base_name().to_string(),
        }
    }
}

impl fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayMode::Skeleton => f.write_str("skeleton"),
            OverlayMode::SkeletonOverSource => f.write_str("overlay"),
        }
    }
}

impl FromStr for OverlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skeleton" => Ok(OverlayMode::Skeleton),
            "overlay" | "skeleton-original" => Ok(OverlayMode::SkeletonOverSource),
            other => Err(format!("unknown overlay mode '{other}' (expected skeleton or overlay)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Finalizing,
}

/// The encoded result of one capture.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub chunk_count: usize,
}

/// Chunk accumulator for one capture, from recorder start to hand-off.
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    chunks: Vec<Vec<u8>>,
    output_name: String,
    mime_type: String,
    discarded: usize,
}

impl CaptureSession {
    pub fn new(output_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            state: CaptureState::Idle,
            chunks: Vec::new(),
            output_name: output_name.into(),
            mime_type: mime_type.into(),
            discarded: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn begin_recording(&mut self) {
        self.state = CaptureState::Recording;
    }

    /// Appends a chunk in arrival order. Empty chunks and chunks arriving
    /// while idle are dropped; returns whether the chunk was kept.
    pub fn push_chunk(&mut self, chunk: Vec<u8>) -> bool {
        if self.state == CaptureState::Idle {
            log::warn!("Dropping {} byte chunk delivered outside a capture", chunk.len());
            return false;
        }
        if chunk.is_empty() {
            self.discarded += 1;
            log::warn!("Discarding empty capture chunk");
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Recording stops taking frames; final chunks may still be pushed.
    pub fn begin_finalizing(&mut self) {
        self.state = CaptureState::Finalizing;
    }

    /// Concatenates the chunks and returns the session to `Idle`.
    pub fn finish(&mut self) -> Artifact {
        let chunks = std::mem::take(&mut self.chunks);
        let chunk_count = chunks.len();
        self.state = CaptureState::Idle;
        Artifact {
            mime_type: self.mime_type.clone(),
            bytes: chunks.concat(),
            chunk_count,
        }
    }
}
