use thiserror::Error;

use super::pose::Pose;
use crate::config::overlay_config::{Architecture, OutputStride};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("failed to load PoseNet {architecture}: {reason}")]
    Load {
        architecture: Architecture,
        reason: String,
    },
    #[error("pose estimation failed: {0}")]
    Estimate(String),
}

impl InferenceError {
    pub fn estimate(err: impl std::fmt::Display) -> Self {
        InferenceError::Estimate(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultiPoseParams {
    pub max_detections: usize,
    pub min_part_confidence: f32,
    pub nms_radius: f32,
}

/// Domain interface for a loaded pose-estimation model.
///
/// Implementations own inference sessions, hence `&mut self`.
pub trait PoseNet: Send {
    fn estimate_single(
        &mut self,
        frame: &Frame,
        image_scale_factor: f32,
        flip_horizontal: bool,
        output_stride: OutputStride,
    ) -> Result<Pose, InferenceError>;

    fn estimate_multi(
        &mut self,
        frame: &Frame,
        image_scale_factor: f32,
        flip_horizontal: bool,
        output_stride: OutputStride,
        params: &MultiPoseParams,
    ) -> Result<Vec<Pose>, InferenceError>;

    /// Releases model resources. Called before a replacement is loaded.
    fn dispose(self: Box<Self>) {}
}

pub trait PoseNetLoader: Send {
    fn load(&self, architecture: Architecture) -> Result<Box<dyn PoseNet>, InferenceError>;
}
