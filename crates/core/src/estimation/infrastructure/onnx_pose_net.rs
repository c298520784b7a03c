/// PoseNet (MobileNet) pose estimator using ONNX Runtime via `ort`.
///
/// Handles stride-aligned resizing, mirroring, inference, and single- or
/// multi-pose decoding; keypoints come back in source-frame pixels.
use std::path::Path;

use crate::config::overlay_config::{Architecture, OutputStride};
use crate::estimation::domain::pose::Pose;
use crate::estimation::domain::pose_net::{InferenceError, MultiPoseParams, PoseNet};
use crate::shared::frame::Frame;

use super::execution_provider::preferred_execution_providers;
use super::input_resolution::{prepare_input, valid_resolution, InputLayout, PreparedInput};
use super::multi_pose_decoder::decode_multiple_poses;
use super::posenet_outputs::PoseNetOutputs;
use super::single_pose_decoder::decode_single_pose;

/// Input-to-frame scale factors `(x, y)`.
type SourceScale = (f32, f32);

pub struct OnnxPoseNet {
    session: ort::session::Session,
    architecture: Architecture,
    layout: InputLayout,
    output_names: Vec<String>,
}

impl OnnxPoseNet {
    /// Load a PoseNet ONNX model.
    ///
    /// The input layout is read from the model's first input: `[1, 3, H, W]`
    /// is channels-first, anything else is treated as `[1, H, W, 3]`. Static
    /// spatial dimensions override the stride-aligned resolution.
    pub fn new(model_path: &Path, architecture: Architecture) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let layout = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() != 4 {
                        return None;
                    }
                    let channels_first = shape[1] == 3;
                    let (h, w) = if channels_first {
                        (shape[2], shape[3])
                    } else {
                        (shape[1], shape[2])
                    };
                    let fixed_size = (h > 0 && w > 0).then_some((w as u32, h as u32));
                    Some(InputLayout {
                        channels_first,
                        fixed_size,
                    })
                } else {
                    None
                }
            })
            .unwrap_or_default();

        let output_names = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();

        log::info!(
            "Loaded PoseNet {architecture} from {} ({:?})",
            model_path.display(),
            layout
        );

        Ok(Self {
            session,
            architecture,
            layout,
            output_names,
        })
    }

    fn infer(
        &mut self,
        frame: &Frame,
        image_scale_factor: f32,
        flip_horizontal: bool,
        output_stride: OutputStride,
    ) -> Result<(PoseNetOutputs, SourceScale), InferenceError> {
        let stride = output_stride.as_u32();
        let (width, height) = self.layout.fixed_size.unwrap_or_else(|| {
            (
                valid_resolution(image_scale_factor, frame.width(), stride),
                valid_resolution(image_scale_factor, frame.height(), stride),
            )
        });
        let PreparedInput {
            tensor,
            scale_x,
            scale_y,
            ..
        } = prepare_input(frame, width, height, flip_horizontal, self.layout)
            .map_err(InferenceError::Estimate)?;

        let input_value = ort::value::Tensor::from_array(tensor).map_err(InferenceError::estimate)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(InferenceError::estimate)?;

        let mut named = Vec::with_capacity(self.output_names.len());
        for (i, name) in self.output_names.iter().enumerate() {
            let tensor = outputs[i]
                .try_extract_array::<f32>()
                .map_err(InferenceError::estimate)?;
            named.push((name.clone(), tensor.to_owned()));
        }
        let decoded = PoseNetOutputs::from_named(named).map_err(InferenceError::Estimate)?;
        Ok((decoded, (scale_x, scale_y)))
    }
}

impl PoseNet for OnnxPoseNet {
    fn estimate_single(
        &mut self,
        frame: &Frame,
        image_scale_factor: f32,
        flip_horizontal: bool,
        output_stride: OutputStride,
    ) -> Result<Pose, InferenceError> {
        let (outputs, scale) = self.infer(frame, image_scale_factor, flip_horizontal, output_stride)?;
        let pose = decode_single_pose(&outputs, output_stride.as_u32());
        Ok(to_source_coords(pose, scale))
    }

    fn estimate_multi(
        &mut self,
        frame: &Frame,
        image_scale_factor: f32,
        flip_horizontal: bool,
        output_stride: OutputStride,
        params: &MultiPoseParams,
    ) -> Result<Vec<Pose>, InferenceError> {
        let (outputs, scale) = self.infer(frame, image_scale_factor, flip_horizontal, output_stride)?;
        let poses = decode_multiple_poses(
            &outputs,
            output_stride.as_u32(),
            params.max_detections,
            params.min_part_confidence,
            params.nms_radius,
        );
        Ok(poses
            .into_iter()
            .map(|pose| to_source_coords(pose, scale))
            .collect())
    }

    fn dispose(self: Box<Self>) {
        log::debug!("Releasing PoseNet {} session", self.architecture);
    }
}

/// Scales input-pixel keypoints back to the frame. A flipped input yields
/// coordinates in the mirrored frame, which is what the overlay draws over.
fn to_source_coords(mut pose: Pose, (scale_x, scale_y): SourceScale) -> Pose {
    for k in &mut pose.keypoints {
        k.position.x *= scale_x;
        k.position.y *= scale_y;
    }
    pose
}
