use std::time::Duration;

/// Posenet feeds are mirrored, so estimation always flips the input.
pub const FLIP_HORIZONTAL: bool = true;

pub const KEYPOINT_RADIUS: u32 = 3;
pub const SKELETON_LINE_WIDTH: u32 = 2;

pub const MODEL_FILE_PREFIX: &str = "posenet_mobilenet_";

/// Interval at which the recorder hands over encoded chunks.
pub const RECORDER_TIMESLICE: Duration = Duration::from_millis(100);

/// How long an exported artifact's transient file outlives the save.
pub const EXPORT_RELEASE_GRACE: Duration = Duration::from_millis(100);

pub const SKELETON_EXPORT_NAME: &str = "pose-estimation-skeleton";
pub const OVERLAY_EXPORT_NAME: &str = "pose-estimation";
pub const MULTI_POSE_SUFFIX: &str = "-multi";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif"];
