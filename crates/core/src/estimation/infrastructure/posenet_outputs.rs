use ndarray::{Array3, ArrayD, Axis, Ix3};

use crate::estimation::domain::body_part::NUM_KEYPOINTS;
use crate::estimation::domain::pose::Position;

const OFFSET_CHANNELS: usize = NUM_KEYPOINTS * 2;
const DISPLACEMENT_CHANNELS: usize = 32;

/// PoseNet's four output maps in `[height, width, channels]` layout.
///
/// `scores` already has the sigmoid applied.
#[derive(Clone, Debug)]
pub struct PoseNetOutputs {
    pub(crate) scores: Array3<f32>,
    pub(crate) offsets: Array3<f32>,
    pub(crate) displacements_fwd: Array3<f32>,
    pub(crate) displacements_bwd: Array3<f32>,
}

impl PoseNetOutputs {
    /// Sorts raw model outputs into their roles.
    ///
    /// Tensors may be NHWC or NCHW with a leading batch of 1. Roles come from
    /// the channel count (17 heatmaps, 34 offsets, 32 displacements); the two
    /// displacement maps are told apart by name (`bwd`/`backward`), falling
    /// back to output order (forward first).
    pub fn from_named(outputs: Vec<(String, ArrayD<f32>)>) -> Result<Self, String> {
        let mut heatmaps = None;
        let mut offsets = None;
        let mut fwd = None;
        let mut bwd = None;
        let mut unnamed_displacements = Vec::new();

        for (name, tensor) in outputs {
            let lower = name.to_lowercase();
            let hwc = match channel_count(&tensor) {
                Some(NUM_KEYPOINTS) => {
                    heatmaps = Some(to_hwc(tensor, NUM_KEYPOINTS)?);
                    continue;
                }
                Some(OFFSET_CHANNELS) => {
                    offsets = Some(to_hwc(tensor, OFFSET_CHANNELS)?);
                    continue;
                }
                Some(DISPLACEMENT_CHANNELS) => to_hwc(tensor, DISPLACEMENT_CHANNELS)?,
                _ => {
                    log::debug!("Ignoring PoseNet output {name} with shape {:?}", tensor.shape());
                    continue;
                }
            };
            if lower.contains("bwd") || lower.contains("backward") {
                bwd = Some(hwc);
            } else if lower.contains("fwd") || lower.contains("forward") {
                fwd = Some(hwc);
            } else {
                unnamed_displacements.push(hwc);
            }
        }

        let mut unnamed = unnamed_displacements.into_iter();
        if fwd.is_none() {
            fwd = unnamed.next();
        }
        if bwd.is_none() {
            bwd = unnamed.next();
        }

        let mut scores = heatmaps.ok_or("model has no 17-channel heatmap output")?;
        scores.mapv_inplace(sigmoid);

        let outputs = Self {
            scores,
            offsets: offsets.ok_or("model has no 34-channel offset output")?,
            displacements_fwd: fwd.ok_or("model has no forward displacement output")?,
            displacements_bwd: bwd.ok_or("model has no backward displacement output")?,
        };
        outputs.check_grid()?;
        Ok(outputs)
    }

    pub fn height(&self) -> usize {
        self.scores.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.scores.shape()[1]
    }

    pub(crate) fn score(&self, y: usize, x: usize, part: usize) -> f32 {
        self.scores[[y, x, part]]
    }

    /// Offset vector for `part` at a heatmap cell.
    pub(crate) fn offset(&self, y: usize, x: usize, part: usize) -> Position {
        Position::new(
            self.offsets[[y, x, part + NUM_KEYPOINTS]],
            self.offsets[[y, x, part]],
        )
    }

    /// Heatmap cell scaled to input pixels plus its offset.
    pub(crate) fn image_coords(&self, y: usize, x: usize, part: usize, stride: u32) -> Position {
        let offset = self.offset(y, x, part);
        Position::new(
            x as f32 * stride as f32 + offset.x,
            y as f32 * stride as f32 + offset.y,
        )
    }

    fn check_grid(&self) -> Result<(), String> {
        let grid = |a: &Array3<f32>| (a.shape()[0], a.shape()[1]);
        let expected = grid(&self.scores);
        for (label, map) in [
            ("offsets", &self.offsets),
            ("forward displacements", &self.displacements_fwd),
            ("backward displacements", &self.displacements_bwd),
        ] {
            if grid(map) != expected {
                return Err(format!(
                    "{label} grid {:?} does not match heatmap grid {expected:?}",
                    grid(map)
                ));
            }
        }
        Ok(())
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Channel count of a 3- or 4-dimensional output, preferring the trailing
/// (NHWC) axis.
fn channel_count(tensor: &ArrayD<f32>) -> Option<usize> {
    const KNOWN: [usize; 3] = [NUM_KEYPOINTS, OFFSET_CHANNELS, DISPLACEMENT_CHANNELS];
    let shape = tensor.shape();
    let (last, first) = match shape.len() {
        4 => (shape[3], shape[1]),
        3 => (shape[2], shape[0]),
        _ => return None,
    };
    [last, first].into_iter().find(|c| KNOWN.contains(c))
}

fn to_hwc(tensor: ArrayD<f32>, channels: usize) -> Result<Array3<f32>, String> {
    let tensor = if tensor.ndim() == 4 {
        if tensor.shape()[0] != 1 {
            return Err(format!("expected batch size 1, got shape {:?}", tensor.shape()));
        }
        tensor.index_axis_move(Axis(0), 0)
    } else {
        tensor
    };
    let arr = tensor
        .into_dimensionality::<Ix3>()
        .map_err(|e| format!("unexpected output rank: {e}"))?;
    if arr.shape()[2] == channels {
        Ok(arr)
    } else {
        // CHW -> HWC
        Ok(arr.permuted_axes([1, 2, 0]).as_standard_layout().to_owned())
    }
}
