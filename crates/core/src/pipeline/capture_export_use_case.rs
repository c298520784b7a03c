use std::path::PathBuf;
use std::time::Instant;

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::capture::domain::artifact_exporter::ArtifactExporter;
use crate::capture::domain::capture_session::{CaptureSession, CaptureState, OverlayMode};
use crate::capture::domain::stream_recorder::{negotiate, RecorderFactory, StreamFormat, StreamRecorder};
use crate::config::config_cell::ConfigReader;
use crate::resource::domain::media_event::MediaEvent;
use crate::resource::domain::media_resource::MediaKind;
use crate::shared::constants::RECORDER_TIMESLICE;

use super::estimation_loop::{EstimationError, EstimationLoop, FrameTap, RenderedFrame, TapControl};
use super::pipeline_logger::PipelineLogger;
use super::resource_manager::{LoadError, ResourceManager};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no WebM encoder available (tried {})", tried.join(", "))]
    Unsupported { tried: Vec<String> },
    #[error("capture requires an active video")]
    NoActiveVideo,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error("recorder failed: {0}")]
    Recorder(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error("capture stopped before playback ended")]
    Interrupted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureOutcome {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: String,
    pub chunk_count: usize,
    pub byte_count: usize,
    pub frames: usize,
}

/// Plays the active video once from the start with the overlay drawn,
/// records the surface and exports the result as a single file.
pub struct CaptureExportUseCase {
    recorder_factory: Box<dyn RecorderFactory>,
    exporter: Box<dyn ArtifactExporter>,
    config: ConfigReader,
    logger: Box<dyn PipelineLogger>,
    state: CaptureState,
}

impl CaptureExportUseCase {
    pub fn new(
        recorder_factory: Box<dyn RecorderFactory>,
        exporter: Box<dyn ArtifactExporter>,
        config: ConfigReader,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            recorder_factory,
            exporter,
            config,
            logger,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        &*self.logger
    }

    /// Captures the active video under `mode`. `observer` sees every frame
    /// the capture renders.
    pub fn capture(
        &mut self,
        manager: &mut ResourceManager,
        estimation: &mut EstimationLoop,
        mode: OverlayMode,
        observer: &mut dyn FrameTap,
    ) -> Result<CaptureOutcome, CaptureError> {
        let result = self.record_and_export(manager, estimation, mode, observer);
        self.state = CaptureState::Idle;
        result
    }

    fn record_and_export(
        &mut self,
        manager: &mut ResourceManager,
        estimation: &mut EstimationLoop,
        mode: OverlayMode,
        observer: &mut dyn FrameTap,
    ) -> Result<CaptureOutcome, CaptureError> {
        let (show_video, show_skeleton) = mode.output_flags();
        self.config.set_output_flags(show_video, show_skeleton);

        manager
            .active_handle()
            .filter(|h| h.kind == MediaKind::Video)
            .ok_or(CaptureError::NoActiveVideo)?;
        let algorithm = self.config.snapshot().estimation.algorithm;

        // Playback is untouched until a recorder exists.
        let (profile, mut recorder) = negotiate(&*self.recorder_factory).map_err(|tried| {
            log::error!("No recorder profile could be constructed");
            CaptureError::Unsupported { tried }
        })?;

        estimation.stop();
        let handle = manager.restart_video(false)?;
        let output_name = mode.output_name(algorithm);
        let file_name = format!("{output_name}.{}", profile.extension);
        let mut session = CaptureSession::new(output_name, recorder.mime_type());

        let (tx, rx) = crossbeam_channel::unbounded();
        let format = StreamFormat {
            width: handle.width,
            height: handle.height,
            fps: handle.fps,
            timeslice: RECORDER_TIMESLICE,
        };
        recorder
            .start(format, tx)
            .map_err(|e| CaptureError::Recorder(e.to_string()))?;
        session.begin_recording();
        self.state = CaptureState::Recording;
        self.logger.info(&format!("Capturing {} as {file_name}", handle.source_token));

        manager.play();
        if let Err(e) = estimation.start(manager) {
            abandon(&mut *recorder);
            return Err(e.into());
        }

        let mut tap = CaptureTap {
            recorder: &mut *recorder,
            chunks: &rx,
            session: &mut session,
            observer,
            ended: false,
            error: None,
            encode_ms: Vec::new(),
        };
        let run = estimation.run(manager, &mut tap);
        let CaptureTap {
            ended,
            error,
            encode_ms,
            ..
        } = tap;
        for ms in encode_ms {
            self.logger.timing("encode", ms);
        }

        let frames = match run {
            Ok(frames) => frames,
            Err(e) => {
                abandon(&mut *recorder);
                return Err(e.into());
            }
        };
        if let Some(e) = error {
            abandon(&mut *recorder);
            return Err(CaptureError::Recorder(e));
        }
        if !ended {
            abandon(&mut *recorder);
            return Err(CaptureError::Interrupted);
        }

        session.begin_finalizing();
        self.state = CaptureState::Finalizing;
        estimation.stop();
        recorder
            .stop()
            .map_err(|e| CaptureError::Recorder(e.to_string()))?;
        for chunk in rx.iter() {
            session.push_chunk(chunk);
        }

        let artifact = session.finish();
        let path = self
            .exporter
            .export(&artifact, &file_name)
            .map_err(|e| CaptureError::Export(e.to_string()))?;
        self.logger.summary();

        Ok(CaptureOutcome {
            path,
            file_name,
            mime_type: artifact.mime_type,
            chunk_count: artifact.chunk_count,
            byte_count: artifact.bytes.len(),
            frames,
        })
    }
}

fn abandon(recorder: &mut dyn StreamRecorder) {
    if let Err(e) = recorder.stop() {
        log::warn!("Failed to stop recorder after aborted capture: {e}");
    }
}

/// Feeds each rendered surface to the recorder and collects chunks as they
/// arrive.
struct CaptureTap<'a> {
    recorder: &'a mut dyn StreamRecorder,
    chunks: &'a Receiver<Vec<u8>>,
    session: &'a mut CaptureSession,
    observer: &'a mut dyn FrameTap,
    ended: bool,
    error: Option<String>,
    encode_ms: Vec<f64>,
}

impl FrameTap for CaptureTap<'_> {
    fn on_frame(&mut self, rendered: &RenderedFrame<'_>) -> TapControl {
        let started = Instant::now();
        if let Err(e) = self.recorder.record(&rendered.surface.snapshot()) {
            log::error!("Recorder rejected frame: {e}");
            self.error = Some(e.to_string());
            return TapControl::Stop;
        }
        self.encode_ms.push(started.elapsed().as_secs_f64() * 1000.0);
        for chunk in self.chunks.try_iter() {
            self.session.push_chunk(chunk);
        }
        self.observer.on_frame(rendered)
    }

    fn on_events(&mut self, events: &[MediaEvent]) -> TapControl {
        let observed = self.observer.on_events(events);
        if events.contains(&MediaEvent::Ended) {
            log::info!("Playback ended; finalizing capture");
            self.ended = true;
            return TapControl::Stop;
        }
        observed
    }
}
