use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::estimation::domain::body_part::{BodyPart, NUM_KEYPOINTS, POSE_CHAIN};
use crate::estimation::domain::pose::{Keypoint, Pose, Position};

use super::posenet_outputs::PoseNetOutputs;

/// Window half-size when testing whether a cell is a local maximum.
const LOCAL_MAXIMUM_RADIUS: usize = 1;

#[derive(Clone, Copy, Debug)]
struct PartCandidate {
    score: f32,
    y: usize,
    x: usize,
    part: usize,
}

impl PartialEq for PartCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PartCandidate {}

impl PartialOrd for PartCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PartCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

/// Decodes up to `max_detections` poses, strongest root first.
///
/// Each root is a local-maximum part cell scoring at least
/// `score_threshold`; roots within `nms_radius` of the same part of an
/// already accepted pose are skipped. Positions are in model-input pixels.
pub fn decode_multiple_poses(
    outputs: &PoseNetOutputs,
    output_stride: u32,
    max_detections: usize,
    score_threshold: f32,
    nms_radius: f32,
) -> Vec<Pose> {
    let squared_nms_radius = nms_radius * nms_radius;
    let mut queue = build_part_queue(outputs, score_threshold);
    let mut poses: Vec<Pose> = Vec::new();

    while poses.len() < max_detections {
        let Some(root) = queue.pop() else { break };
        let root_position = outputs.image_coords(root.y, root.x, root.part, output_stride);
        if within_nms_radius(&poses, squared_nms_radius, root_position, root.part) {
            continue;
        }
        let keypoints = decode_pose(outputs, &root, root_position, output_stride);
        let score = instance_score(&poses, squared_nms_radius, &keypoints);
        poses.push(Pose { score, keypoints });
    }
    poses
}

fn build_part_queue(outputs: &PoseNetOutputs, score_threshold: f32) -> BinaryHeap<PartCandidate> {
    let (height, width) = (outputs.height(), outputs.width());
    let mut queue = BinaryHeap::new();
    for y in 0..height {
        for x in 0..width {
            for part in 0..NUM_KEYPOINTS {
                let score = outputs.score(y, x, part);
                if score < score_threshold {
                    continue;
                }
                if is_local_maximum(outputs, part, score, y, x) {
                    queue.push(PartCandidate { score, y, x, part });
                }
            }
        }
    }
    queue
}

fn is_local_maximum(outputs: &PoseNetOutputs, part: usize, score: f32, y: usize, x: usize) -> bool {
    let y_end = (y + LOCAL_MAXIMUM_RADIUS + 1).min(outputs.height());
    let x_end = (x + LOCAL_MAXIMUM_RADIUS + 1).min(outputs.width());
    for yc in y.saturating_sub(LOCAL_MAXIMUM_RADIUS)..y_end {
        for xc in x.saturating_sub(LOCAL_MAXIMUM_RADIUS)..x_end {
            if outputs.score(yc, xc, part) > score {
                return false;
            }
        }
    }
    true
}

fn squared_distance(a: Position, b: Position) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn within_nms_radius(poses: &[Pose], squared_radius: f32, point: Position, part: usize) -> bool {
    poses.iter().any(|pose| {
        pose.keypoints
            .get(part)
            .is_some_and(|k| squared_distance(point, k.position) <= squared_radius)
    })
}

/// Mean over all parts, counting only keypoints not already claimed by an
/// earlier pose.
fn instance_score(poses: &[Pose], squared_radius: f32, keypoints: &[Keypoint]) -> f32 {
    if keypoints.is_empty() {
        return 0.0;
    }
    let total: f32 = keypoints
        .iter()
        .enumerate()
        .filter(|(part, k)| !within_nms_radius(poses, squared_radius, k.position, *part))
        .map(|(_, k)| k.confidence)
        .sum();
    total / keypoints.len() as f32
}

/// Nearest heatmap cell to a point in input pixels.
fn strided_index_near(point: Position, stride: u32, height: usize, width: usize) -> (usize, usize) {
    let clamp = |v: f32, len: usize| (v / stride as f32).round().clamp(0.0, (len - 1) as f32) as usize;
    (clamp(point.y, height), clamp(point.x, width))
}

fn traverse_to_target(
    outputs: &PoseNetOutputs,
    edge: usize,
    source: &Keypoint,
    target: BodyPart,
    output_stride: u32,
    backward: bool,
) -> Keypoint {
    let (height, width) = (outputs.height(), outputs.width());
    let displacements = if backward {
        &outputs.displacements_bwd
    } else {
        &outputs.displacements_fwd
    };
    let num_edges = displacements.shape()[2] / 2;

    let (sy, sx) = strided_index_near(source.position, output_stride, height, width);
    let displaced = Position::new(
        source.position.x + displacements[[sy, sx, num_edges + edge]],
        source.position.y + displacements[[sy, sx, edge]],
    );
    let (ty, tx) = strided_index_near(displaced, output_stride, height, width);

    Keypoint {
        part: target,
        position: outputs.image_coords(ty, tx, target.index(), output_stride),
        confidence: outputs.score(ty, tx, target.index()),
    }
}

/// Grows a full skeleton from `root`: first towards the root of the chain
/// using backward displacements, then outwards using forward ones.
fn decode_pose(
    outputs: &PoseNetOutputs,
    root: &PartCandidate,
    root_position: Position,
    output_stride: u32,
) -> Vec<Keypoint> {
    let mut instance: [Option<Keypoint>; NUM_KEYPOINTS] = [None; NUM_KEYPOINTS];
    let root_part = BodyPart::ALL[root.part];
    instance[root.part] = Some(Keypoint {
        part: root_part,
        position: root_position,
        confidence: root.score,
    });

    for (edge, &(parent, child)) in POSE_CHAIN.iter().enumerate().rev() {
        if let (Some(source), None) = (instance[child.index()], instance[parent.index()]) {
            instance[parent.index()] =
                Some(traverse_to_target(outputs, edge, &source, parent, output_stride, true));
        }
    }

    for (edge, &(parent, child)) in POSE_CHAIN.iter().enumerate() {
        if let (Some(source), None) = (instance[parent.index()], instance[child.index()]) {
            instance[child.index()] =
                Some(traverse_to_target(outputs, edge, &source, child, output_stride, false));
        }
    }

    instance.into_iter().flatten().collect()
}
