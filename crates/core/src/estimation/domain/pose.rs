use serde::Serialize;

use super::body_part::{BodyPart, CONNECTED_PARTS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Keypoint {
    pub part: BodyPart,
    pub position: Position,
    #[serde(rename = "score")]
    pub confidence: f32,
}

/// One detected subject. Positions are in source-frame pixels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pose {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.part == part)
    }

    /// Skeleton pairs whose endpoints both reach `min_confidence`.
    pub fn adjacent_keypoints(&self, min_confidence: f32) -> Vec<(&Keypoint, &Keypoint)> {
        CONNECTED_PARTS
            .iter()
            .filter_map(|&(a, b)| {
                let ka = self.keypoint(a)?;
                let kb = self.keypoint(b)?;
                (ka.confidence >= min_confidence && kb.confidence >= min_confidence)
                    .then_some((ka, kb))
            })
            .collect()
    }
}
