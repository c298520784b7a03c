use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::config::config_cell::ConfigReader;
use crate::config::overlay_config::{Algorithm, Architecture, OverlayConfig};
use crate::estimation::domain::pose::Pose;
use crate::estimation::domain::pose_net::{InferenceError, MultiPoseParams, PoseNet, PoseNetLoader};
use crate::rendering::domain::keypoint_renderer::{render_poses, RenderOptions};
use crate::rendering::domain::raster_surface::RasterSurface;
use crate::resource::domain::media_event::MediaEvent;
use crate::resource::domain::media_resource::ResourceHandle;
use crate::shared::constants::FLIP_HORIZONTAL;
use crate::shared::frame::Frame;

use super::pipeline_logger::PipelineLogger;
use super::resource_manager::{LoadError, ResourceManager};

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("no active media resource")]
    NoActiveResource,
    #[error("estimation loop is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Media(#[from] LoadError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelSlot {
    Empty,
    Ready(Architecture),
    Swapping(Architecture),
}

/// What the loop does after an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    Continue,
    Dormant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapControl {
    Continue,
    Stop,
}

/// One rendered iteration, as seen by a tap.
pub struct RenderedFrame<'a> {
    pub surface: &'a dyn RasterSurface,
    pub source: &'a Frame,
    pub poses: &'a [Pose],
}

/// Observer of the loop's output: the capture stream, a pose dump.
pub trait FrameTap {
    fn on_frame(&mut self, rendered: &RenderedFrame<'_>) -> TapControl;

    /// Media events drained after each iteration and once more when the
    /// source runs dry.
    fn on_events(&mut self, _events: &[MediaEvent]) -> TapControl {
        TapControl::Continue
    }
}

pub struct NoopTap;

impl FrameTap for NoopTap {
    fn on_frame(&mut self, _rendered: &RenderedFrame<'_>) -> TapControl {
        TapControl::Continue
    }
}

/// Cooperative stop request, checked after each iteration's drawing.
#[derive(Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Pulls frames from the active resource, runs pose estimation and draws
/// the result onto the surface, one frame per iteration.
pub struct EstimationLoop {
    loader: Box<dyn PoseNetLoader>,
    net: Option<Box<dyn PoseNet>>,
    slot: ModelSlot,
    config: ConfigReader,
    surface: Box<dyn RasterSurface>,
    logger: Box<dyn PipelineLogger>,
    state: LoopState,
    stop_flag: Arc<AtomicBool>,
    handle: Option<ResourceHandle>,
    frames_rendered: usize,
}

impl EstimationLoop {
    pub fn new(
        loader: Box<dyn PoseNetLoader>,
        config: ConfigReader,
        surface: Box<dyn RasterSurface>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            loader,
            net: None,
            slot: ModelSlot::Empty,
            config,
            surface,
            logger,
            state: LoopState::Stopped,
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
            frames_rendered: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn model_slot(&self) -> ModelSlot {
        self.slot
    }

    pub fn surface(&self) -> &dyn RasterSurface {
        &*self.surface
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        &*self.logger
    }

    /// Frames drawn since the loop was created.
    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }

    /// Starts rendering the manager's active resource.
    ///
    /// Loads the configured model first if none is loaded yet, and sizes
    /// the surface to the resource.
    pub fn start(&mut self, manager: &ResourceManager) -> Result<StopHandle, EstimationError> {
        if self.state == LoopState::Running {
            return Err(EstimationError::AlreadyRunning);
        }
        let handle = manager.active_handle().ok_or(EstimationError::NoActiveResource)?;

        if self.net.is_none() {
            let architecture = self.config.snapshot().estimation.architecture;
            let net = self.loader.load(architecture).map_err(|e| {
                log::error!("{e}");
                e
            })?;
            self.net = Some(net);
            self.slot = ModelSlot::Ready(architecture);
            self.config.set_loaded_architecture(Some(architecture));
        }

        self.surface.resize(handle.width, handle.height);
        self.stop_flag = Arc::new(AtomicBool::new(false));
        self.logger.info(&format!(
            "Estimating poses on {} ({}x{})",
            handle.source_token, handle.width, handle.height
        ));
        self.handle = Some(handle);
        self.state = LoopState::Running;
        Ok(StopHandle {
            flag: Arc::clone(&self.stop_flag),
        })
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        self.go_dormant();
    }

    fn go_dormant(&mut self) {
        if self.state == LoopState::Running {
            log::info!("Estimation loop stopped after {} frames", self.frames_rendered);
        }
        self.state = LoopState::Stopped;
        self.handle = None;
    }

    /// Iterates until the loop goes dormant.
    pub fn run(&mut self, manager: &mut ResourceManager, tap: &mut dyn FrameTap) -> Result<usize, EstimationError> {
        let before = self.frames_rendered;
        let result = loop {
            match self.step(manager, tap) {
                Ok(Schedule::Continue) => continue,
                Ok(Schedule::Dormant) => break Ok(self.frames_rendered - before),
                Err(e) => break Err(e),
            }
        };
        self.logger.summary();
        result
    }

    /// Runs a single iteration.
    pub fn step(&mut self, manager: &mut ResourceManager, tap: &mut dyn FrameTap) -> Result<Schedule, EstimationError> {
        if self.state != LoopState::Running {
            return Ok(Schedule::Dormant);
        }
        let Some(handle) = self.handle.clone() else {
            self.go_dormant();
            return Ok(Schedule::Dormant);
        };
        if !manager.is_current(&handle) {
            log::info!("Resource generation {} was replaced", handle.generation);
            self.go_dormant();
            return Ok(Schedule::Dormant);
        }

        if let Some(architecture) = self.config.begin_architecture_swap() {
            self.swap_model(architecture)?;
            return Ok(self.continue_unless_stopped());
        }

        let pulled = match manager.frame(&handle) {
            Ok(pulled) => pulled,
            Err(e) => {
                log::error!("{e}");
                self.go_dormant();
                return Err(e.into());
            }
        };
        let Some(frame) = pulled else {
            let events = manager.drain_events();
            tap.on_events(&events);
            log::debug!("No frame available for generation {}", handle.generation);
            self.go_dormant();
            return Ok(Schedule::Dormant);
        };

        let config = self.config.snapshot();
        let started = Instant::now();
        let poses = match self.estimate(&frame, &config) {
            Ok(poses) => poses,
            Err(e) => {
                log::error!("{e}");
                self.go_dormant();
                return Err(e.into());
            }
        };
        self.logger.timing("estimate", started.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("poses", poses.len() as f64);

        let started = Instant::now();
        self.surface.clear();
        if config.output.show_video {
            self.surface.draw_frame_mirrored(&frame);
        }
        let commands = render_poses(&poses, config.estimation.thresholds(), &RenderOptions::from(&config.output));
        self.surface.apply_all(&commands);
        self.logger.timing("render", started.elapsed().as_secs_f64() * 1000.0);
        self.frames_rendered += 1;
        self.logger.progress(self.frames_rendered, handle.total_frames);

        let rendered = RenderedFrame {
            surface: &*self.surface,
            source: &frame,
            poses: &poses,
        };
        let mut control = tap.on_frame(&rendered);
        let events = manager.drain_events();
        if tap.on_events(&events) == TapControl::Stop {
            control = TapControl::Stop;
        }

        if self.stop_flag.load(Ordering::Relaxed) || control == TapControl::Stop || !handle.is_continuous() {
            self.go_dormant();
            return Ok(Schedule::Dormant);
        }
        Ok(Schedule::Continue)
    }

    fn continue_unless_stopped(&mut self) -> Schedule {
        if self.stop_flag.load(Ordering::Relaxed) {
            self.go_dormant();
            Schedule::Dormant
        } else {
            Schedule::Continue
        }
    }

    fn swap_model(&mut self, architecture: Architecture) -> Result<(), EstimationError> {
        log::info!("Swapping PoseNet to {architecture}");
        self.slot = ModelSlot::Swapping(architecture);
        if let Some(net) = self.net.take() {
            net.dispose();
        }
        let loaded = self.loader.load(architecture);
        match loaded {
            Ok(net) => {
                self.net = Some(net);
                self.slot = ModelSlot::Ready(architecture);
                self.config.set_loaded_architecture(Some(architecture));
                self.config.finish_architecture_swap();
                Ok(())
            }
            Err(e) => {
                log::error!("{e}");
                self.config.set_loaded_architecture(None);
                self.config.finish_architecture_swap();
                self.slot = ModelSlot::Empty;
                self.go_dormant();
                Err(e.into())
            }
        }
    }

    fn estimate(&mut self, frame: &Frame, config: &OverlayConfig) -> Result<Vec<Pose>, InferenceError> {
        let net = self
            .net
            .as_mut()
            .ok_or_else(|| InferenceError::Estimate("no model loaded".to_string()))?;
        let estimation = &config.estimation;
        match estimation.algorithm {
            Algorithm::SinglePose => {
                let pose = net.estimate_single(
                    frame,
                    estimation.image_scale_factor,
                    FLIP_HORIZONTAL,
                    estimation.output_stride,
                )?;
                Ok(vec![pose])
            }
            Algorithm::MultiPose => {
                let multi = &estimation.multi_pose_detection;
                let params = MultiPoseParams {
                    max_detections: multi.max_pose_detections as usize,
                    min_part_confidence: multi.min_part_confidence,
                    nms_radius: multi.nms_radius,
                };
                net.estimate_multi(
                    frame,
                    estimation.image_scale_factor,
                    FLIP_HORIZONTAL,
                    estimation.output_stride,
                    &params,
                )
            }
        }
    }
}
