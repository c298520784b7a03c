use crate::config::overlay_config::{OutputOptions, PoseThresholds};
use crate::estimation::domain::pose::Pose;
use crate::shared::color::Color;
use crate::shared::constants::{KEYPOINT_RADIUS, SKELETON_LINE_WIDTH};

use super::draw_command::DrawCommand;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub show_points: bool,
    pub show_skeleton: bool,
    pub color: Color,
    pub point_radius: u32,
    pub line_width: u32,
}

impl From<&OutputOptions> for RenderOptions {
    fn from(output: &OutputOptions) -> Self {
        Self {
            show_points: output.show_points,
            show_skeleton: output.show_skeleton,
            color: output.color,
            point_radius: KEYPOINT_RADIUS,
            line_width: SKELETON_LINE_WIDTH,
        }
    }
}

/// Maps poses to draw commands.
///
/// A pose below `min_pose_confidence` contributes nothing. For the rest,
/// keypoints below `min_part_confidence` are neither drawn nor used as a
/// segment endpoint. Points come before the skeleton within each pose.
pub fn render_poses(poses: &[Pose], thresholds: PoseThresholds, options: &RenderOptions) -> Vec<DrawCommand> {
    let mut commands = Vec::new();
    for pose in poses {
        if pose.score < thresholds.min_pose_confidence {
            continue;
        }
        if options.show_points {
            commands.extend(
                pose.keypoints
                    .iter()
                    .filter(|k| k.confidence >= thresholds.min_part_confidence)
                    .map(|k| DrawCommand::Point {
                        center: k.position,
                        radius: options.point_radius,
                        color: options.color,
                    }),
            );
        }
        if options.show_skeleton {
            commands.extend(
                pose.adjacent_keypoints(thresholds.min_part_confidence)
                    .into_iter()
                    .map(|(a, b)| DrawCommand::Segment {
                        from: a.position,
                        to: b.position,
                        width: options.line_width,
                        color: options.color,
                    }),
            );
        }
    }
    commands
}
