use crate::estimation::domain::body_part::BodyPart;
use crate::estimation::domain::pose::{Keypoint, Pose};

use super::posenet_outputs::PoseNetOutputs;

/// Best-scoring cell per part, refined by its offset. Positions are in
/// model-input pixels; the pose score is the mean keypoint score.
pub fn decode_single_pose(outputs: &PoseNetOutputs, output_stride: u32) -> Pose {
    let (height, width) = (outputs.height(), outputs.width());
    if height == 0 || width == 0 {
        return Pose {
            score: 0.0,
            keypoints: Vec::new(),
        };
    }
    let mut keypoints = Vec::with_capacity(BodyPart::ALL.len());

    for part in BodyPart::ALL {
        let k = part.index();
        let mut best = (0usize, 0usize, f32::NEG_INFINITY);
        for y in 0..height {
            for x in 0..width {
                let score = outputs.score(y, x, k);
                if score > best.2 {
                    best = (y, x, score);
                }
            }
        }
        let (y, x, score) = best;
        keypoints.push(Keypoint {
            part,
            position: outputs.image_coords(y, x, k, output_stride),
            confidence: score.max(0.0),
        });
    }

    let score = keypoints.iter().map(|k| k.confidence).sum::<f32>() / keypoints.len() as f32;
    Pose { score, keypoints }
}
