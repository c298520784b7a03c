use serde::Serialize;

pub const NUM_KEYPOINTS: usize = 17;

/// The 17 PoseNet keypoints, in model channel order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

use BodyPart::*;

impl BodyPart {
    pub const ALL: [BodyPart; NUM_KEYPOINTS] = [
        Nose,
        LeftEye,
        RightEye,
        LeftEar,
        RightEar,
        LeftShoulder,
        RightShoulder,
        LeftElbow,
        RightElbow,
        LeftWrist,
        RightWrist,
        LeftHip,
        RightHip,
        LeftKnee,
        RightKnee,
        LeftAnkle,
        RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<BodyPart> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Nose => "nose",
            LeftEye => "leftEye",
            RightEye => "rightEye",
            LeftEar => "leftEar",
            RightEar => "rightEar",
            LeftShoulder => "leftShoulder",
            RightShoulder => "rightShoulder",
            LeftElbow => "leftElbow",
            RightElbow => "rightElbow",
            LeftWrist => "leftWrist",
            RightWrist => "rightWrist",
            LeftHip => "leftHip",
            RightHip => "rightHip",
            LeftKnee => "leftKnee",
            RightKnee => "rightKnee",
            LeftAnkle => "leftAnkle",
            RightAnkle => "rightAnkle",
        }
    }
}

/// Pairs drawn as skeleton segments.
pub const CONNECTED_PARTS: [(BodyPart, BodyPart); 12] = [
    (LeftHip, LeftShoulder),
    (LeftElbow, LeftShoulder),
    (LeftElbow, LeftWrist),
    (LeftHip, LeftKnee),
    (LeftKnee, LeftAnkle),
    (RightHip, RightShoulder),
    (RightElbow, RightShoulder),
    (RightElbow, RightWrist),
    (RightHip, RightKnee),
    (RightKnee, RightAnkle),
    (LeftShoulder, RightShoulder),
    (LeftHip, RightHip),
];

/// Parent → child edges of the tree the multi-pose decoder walks from a
/// root keypoint. Edge `i` owns displacement channels `i` (y) and
/// `i + POSE_CHAIN.len()` (x).
pub const POSE_CHAIN: [(BodyPart, BodyPart); 16] = [
    (Nose, LeftEye),
    (LeftEye, LeftEar),
    (Nose, RightEye),
    (RightEye, RightEar),
    (Nose, LeftShoulder),
    (LeftShoulder, LeftElbow),
    (LeftElbow, LeftWrist),
    (LeftShoulder, LeftHip),
    (LeftHip, LeftKnee),
    (LeftKnee, LeftAnkle),
    (Nose, RightShoulder),
    (RightShoulder, RightElbow),
    (RightElbow, RightWrist),
    (RightShoulder, RightHip),
    (RightHip, RightKnee),
    (RightKnee, RightAnkle),
];
