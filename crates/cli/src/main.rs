use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use posecast_core::capture::domain::capture_session::OverlayMode;
use posecast_core::capture::infrastructure::download_exporter::DownloadExporter;
use posecast_core::capture::infrastructure::ffmpeg_stream_recorder::FfmpegRecorderFactory;
use posecast_core::config::config_cell::{config_cell, ConfigReader};
use posecast_core::config::overlay_config::{Algorithm, Architecture, OutputStride, OverlayConfig};
use posecast_core::estimation::infrastructure::onnx_pose_net_loader::OnnxPoseNetLoader;
use posecast_core::pipeline::capture_export_use_case::{CaptureError, CaptureExportUseCase};
use posecast_core::pipeline::estimation_loop::{EstimationLoop, FrameTap, RenderedFrame, TapControl};
use posecast_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use posecast_core::pipeline::resource_manager::ResourceManager;
use posecast_core::rendering::domain::snapshot_writer::SnapshotWriter;
use posecast_core::rendering::infrastructure::image_surface::ImageSurface;
use posecast_core::rendering::infrastructure::png_snapshot_writer::PngSnapshotWriter;
use posecast_core::resource::domain::byte_source::ByteSource;
use posecast_core::resource::domain::media_event::MediaEvent;
use posecast_core::resource::domain::media_resource::MediaKind;
use posecast_core::resource::infrastructure::decoding_media_platform::DecodingMediaPlatform;
use posecast_core::resource::infrastructure::file_byte_source::FileByteSource;
use posecast_core::resource::infrastructure::url_byte_source::UrlByteSource;
use posecast_core::shared::color::Color;

/// Live pose-estimation overlay for images and videos.
#[derive(Parser)]
#[command(name = "posecast")]
struct Cli {
    /// Input image or video: a local path or an http(s) URL.
    input: String,

    /// Override the MIME type reported by the source.
    #[arg(long)]
    mime_type: Option<String>,

    /// JSON preset for estimation and output settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// single-pose or multi-pose.
    #[arg(long)]
    algorithm: Option<Algorithm>,

    /// Model width multiplier: 0.50, 0.75, 1.00 or 1.01.
    #[arg(long)]
    architecture: Option<Architecture>,

    /// Output stride: 8, 16 or 32.
    #[arg(long)]
    output_stride: Option<OutputStride>,

    /// Input downscale before inference (0.2-1.0).
    #[arg(long)]
    image_scale_factor: Option<f32>,

    /// Minimum pose score for the active algorithm.
    #[arg(long)]
    min_pose_confidence: Option<f32>,

    /// Minimum keypoint confidence for the active algorithm.
    #[arg(long)]
    min_part_confidence: Option<f32>,

    /// Maximum poses in multi-pose mode (1-20).
    #[arg(long)]
    max_detections: Option<u32>,

    /// Non-maximum suppression radius in multi-pose mode (0-40).
    #[arg(long)]
    nms_radius: Option<f32>,

    /// Do not draw the source frame behind the overlay.
    #[arg(long)]
    hide_video: bool,

    /// Do not draw skeleton segments.
    #[arg(long)]
    hide_skeleton: bool,

    /// Do not draw keypoints.
    #[arg(long)]
    hide_points: bool,

    /// Overlay colour as #rrggbb.
    #[arg(long)]
    color: Option<Color>,

    /// Directory searched for model files before the cache is populated.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Base URL model files are downloaded from.
    #[arg(long)]
    model_url: Option<String>,

    /// Capture the video with the overlay: skeleton or overlay.
    #[arg(long)]
    export: Option<OverlayMode>,

    /// Directory exported captures are written to.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Write the last rendered surface to a PNG file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print each frame's poses to stdout as JSON lines.
    #[arg(long)]
    dump_poses: bool,

    /// Loop video previews instead of stopping at the end.
    #[arg(long = "loop")]
    loop_preview: bool,

    /// Stop a preview after this many frames.
    #[arg(long)]
    max_frames: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let (_writer, reader) = config_cell(build_config(&cli)?);

    let mut manager = ResourceManager::new(Box::new(DecodingMediaPlatform::new()));
    manager.set_preview_looping(cli.loop_preview);
    let source = open_source(&cli.input);
    let handle = manager
        .load_resource(&*source, cli.mime_type.as_deref())
        .map_err(|e| format!("Failed to load resource: {e}"))?;
    log::info!(
        "Loaded {} {} ({}x{})",
        if handle.kind == MediaKind::Video { "video" } else { "image" },
        handle.source_token,
        handle.width,
        handle.height
    );

    let mut estimation = EstimationLoop::new(
        Box::new(OnnxPoseNetLoader::new(cli.model_dir.clone(), cli.model_url.clone())),
        reader.clone(),
        Box::new(ImageSurface::new(handle.width, handle.height)),
        Box::new(SummaryPipelineLogger::default()),
    );
    let mut tap = CliTap::new(cli.dump_poses, cli.max_frames);

    match cli.export {
        Some(mode) => run_capture(&cli, reader, &mut manager, &mut estimation, mode, &mut tap)?,
        None => {
            if handle.kind == MediaKind::Video {
                manager.play();
            }
            estimation.start(&manager)?;
            let frames = estimation.run(&mut manager, &mut tap)?;
            log::info!("Rendered {frames} frames");
        }
    }

    if let Some(path) = &cli.snapshot {
        PngSnapshotWriter::new().write(path, &estimation.surface().snapshot())?;
        log::info!("Snapshot written to {}", path.display());
    }
    Ok(())
}

fn run_capture(
    cli: &Cli,
    reader: ConfigReader,
    manager: &mut ResourceManager,
    estimation: &mut EstimationLoop,
    mode: OverlayMode,
    tap: &mut CliTap,
) -> Result<(), Box<dyn std::error::Error>> {
    let exporter = DownloadExporter::new(&cli.output_dir);
    let mut capture = CaptureExportUseCase::new(
        Box::new(FfmpegRecorderFactory),
        Box::new(exporter),
        reader,
        Box::new(SummaryPipelineLogger::default()),
    );
    match capture.capture(manager, estimation, mode, tap) {
        Ok(outcome) => {
            log::info!(
                "Exported {} ({} bytes, {} frames) to {}",
                outcome.mime_type,
                outcome.byte_count,
                outcome.frames,
                outcome.path.display()
            );
            Ok(())
        }
        Err(CaptureError::Unsupported { tried }) => Err(format!(
            "Capture unavailable: this ffmpeg build has no VP8/VP9 WebM encoder (tried {})",
            tried.join(", ")
        )
        .into()),
        Err(CaptureError::Load(e)) => Err(format!("Failed to load resource: {e}").into()),
        Err(e) => Err(e.into()),
    }
}

fn open_source(input: &str) -> Box<dyn ByteSource> {
    if UrlByteSource::accepts(input) {
        Box::new(UrlByteSource::new(input))
    } else {
        Box::new(FileByteSource::new(input))
    }
}

fn build_config(cli: &Cli) -> Result<OverlayConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => OverlayConfig::load_from(path)?,
        None => OverlayConfig::default(),
    };

    let est = &mut config.estimation;
    if let Some(algorithm) = cli.algorithm {
        est.algorithm = algorithm;
    }
    if let Some(architecture) = cli.architecture {
        est.architecture = architecture;
    }
    if let Some(stride) = cli.output_stride {
        est.output_stride = stride;
    }
    if let Some(scale) = cli.image_scale_factor {
        est.image_scale_factor = scale;
    }
    match est.algorithm {
        Algorithm::SinglePose => {
            let single = &mut est.single_pose_detection;
            if let Some(v) = cli.min_pose_confidence {
                single.min_pose_confidence = v;
            }
            if let Some(v) = cli.min_part_confidence {
                single.min_part_confidence = v;
            }
        }
        Algorithm::MultiPose => {
            let multi = &mut est.multi_pose_detection;
            if let Some(v) = cli.min_pose_confidence {
                multi.min_pose_confidence = v;
            }
            if let Some(v) = cli.min_part_confidence {
                multi.min_part_confidence = v;
            }
        }
    }
    if let Some(max) = cli.max_detections {
        est.multi_pose_detection.max_pose_detections = max;
    }
    if let Some(radius) = cli.nms_radius {
        est.multi_pose_detection.nms_radius = radius;
    }

    let output = &mut config.output;
    output.show_video &= !cli.hide_video;
    output.show_skeleton &= !cli.hide_skeleton;
    output.show_points &= !cli.hide_points;
    if let Some(color) = cli.color {
        output.color = color;
    }
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !UrlByteSource::accepts(&cli.input) && !PathBuf::from(&cli.input).exists() {
        return Err(format!("Input file not found: {}", cli.input).into());
    }
    for (name, value) in [
        ("Minimum pose confidence", cli.min_pose_confidence),
        ("Minimum part confidence", cli.min_part_confidence),
    ] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{name} must be between 0.0 and 1.0, got {v}").into());
            }
        }
    }
    if let Some(scale) = cli.image_scale_factor {
        if !(0.2..=1.0).contains(&scale) {
            return Err(format!("Image scale factor must be between 0.2 and 1.0, got {scale}").into());
        }
    }
    if let Some(max) = cli.max_detections {
        if !(1..=20).contains(&max) {
            return Err(format!("Max detections must be between 1 and 20, got {max}").into());
        }
    }
    if let Some(radius) = cli.nms_radius {
        if !(0.0..=40.0).contains(&radius) {
            return Err(format!("NMS radius must be between 0 and 40, got {radius}").into());
        }
    }
    if cli.export.is_some() && cli.max_frames.is_some() {
        return Err("--max-frames cannot be combined with --export".into());
    }
    Ok(())
}

/// Prints poses and enforces the frame limit.
struct CliTap {
    dump_poses: bool,
    max_frames: Option<usize>,
    frames: usize,
}

impl CliTap {
    fn new(dump_poses: bool, max_frames: Option<usize>) -> Self {
        Self {
            dump_poses,
            max_frames,
            frames: 0,
        }
    }
}

impl FrameTap for CliTap {
    fn on_frame(&mut self, rendered: &RenderedFrame<'_>) -> TapControl {
        self.frames += 1;
        if self.dump_poses {
            let line = serde_json::json!({
                "frame": rendered.source.index(),
                "poses": rendered.poses,
            });
            let mut stdout = io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{line}") {
                log::warn!("Failed to write poses: {e}");
            }
        }
        match self.max_frames {
            Some(max) if self.frames >= max => TapControl::Stop,
            _ => TapControl::Continue,
        }
    }

    fn on_events(&mut self, events: &[MediaEvent]) -> TapControl {
        for event in events {
            match event {
                MediaEvent::Error(message) => eprintln!("Playback error: {message}"),
                MediaEvent::Stalled => eprintln!("Playback stalled"),
                _ => {}
            }
        }
        TapControl::Continue
    }
}
