use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::color::Color;
use crate::shared::constants::MODEL_FILE_PREFIX;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read preset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid preset: {0}")]
    Parse(#[from] serde_json::Error),
}

/// MobileNet width multiplier of the loaded PoseNet checkpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "0.50")]
    MobileNet050,
    #[serde(rename = "0.75")]
    MobileNet075,
    #[serde(rename = "1.00")]
    MobileNet100,
    #[default]
    #[serde(rename = "1.01")]
    MobileNet101,
}

impl Architecture {
    pub const ALL: [Architecture; 4] = [
        Architecture::MobileNet050,
        Architecture::MobileNet075,
        Architecture::MobileNet100,
        Architecture::MobileNet101,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Architecture::MobileNet050 => "0.50",
            Architecture::MobileNet075 => "0.75",
            Architecture::MobileNet100 => "1.00",
            Architecture::MobileNet101 => "1.01",
        }
    }

    /// e.g. `posenet_mobilenet_101.onnx`
    pub fn model_file_name(&self) -> String {
        let digits: String = self.label().chars().filter(|c| *c != '.').collect();
        format!("{MODEL_FILE_PREFIX}{digits}.onnx")
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0.50" | "0.5" => Ok(Architecture::MobileNet050),
            "0.75" => Ok(Architecture::MobileNet075),
            "1.00" | "1.0" | "1" => Ok(Architecture::MobileNet100),
            "1.01" => Ok(Architecture::MobileNet101),
            other => Err(format!(
                "unknown architecture '{other}' (expected 0.50, 0.75, 1.00 or 1.01)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum OutputStride {
    Eight,
    #[default]
    Sixteen,
    ThirtyTwo,
}

impl OutputStride {
    pub fn as_u32(&self) -> u32 {
        match self {
            OutputStride::Eight => 8,
            OutputStride::Sixteen => 16,
            OutputStride::ThirtyTwo => 32,
        }
    }
}

impl TryFrom<u32> for OutputStride {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(OutputStride::Eight),
            16 => Ok(OutputStride::Sixteen),
            32 => Ok(OutputStride::ThirtyTwo),
            other => Err(format!("output stride must be 8, 16 or 32, got {other}")),
        }
    }
}

impl From<OutputStride> for u32 {
    fn from(stride: OutputStride) -> Self {
        stride.as_u32()
    }
}

impl FromStr for OutputStride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| format!("invalid stride '{s}'"))?;
        OutputStride::try_from(value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "single-pose")]
    SinglePose,
    #[serde(rename = "multi-pose")]
    MultiPose,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single-pose" | "single" => Ok(Algorithm::SinglePose),
            "multi-pose" | "multi" => Ok(Algorithm::MultiPose),
            other => Err(format!("unknown algorithm '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SingleThresholds {
    pub min_pose_confidence: f32,
    pub min_part_confidence: f32,
}

impl Default for SingleThresholds {
    fn default() -> Self {
        Self {
            min_pose_confidence: 0.1,
            min_part_confidence: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultiThresholds {
    pub max_pose_detections: u32,
    pub min_pose_confidence: f32,
    pub min_part_confidence: f32,
    pub nms_radius: f32,
}

impl Default for MultiThresholds {
    fn default() -> Self {
        Self {
            max_pose_detections: 2,
            min_pose_confidence: 0.1,
            min_part_confidence: 0.3,
            nms_radius: 20.0,
        }
    }
}

/// The pair of thresholds the renderer filters by, for whichever algorithm
/// is active.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseThresholds {
    pub min_pose_confidence: f32,
    pub min_part_confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimationConfig {
    pub algorithm: Algorithm,
    pub architecture: Architecture,
    pub output_stride: OutputStride,
    pub image_scale_factor: f32,
    pub single_pose_detection: SingleThresholds,
    pub multi_pose_detection: MultiThresholds,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SinglePose,
            architecture: Architecture::MobileNet101,
            output_stride: OutputStride::Sixteen,
            image_scale_factor: 0.5,
            single_pose_detection: SingleThresholds::default(),
            multi_pose_detection: MultiThresholds::default(),
        }
    }
}

impl EstimationConfig {
    pub fn thresholds(&self) -> PoseThresholds {
        match self.algorithm {
            Algorithm::SinglePose => PoseThresholds {
                min_pose_confidence: self.single_pose_detection.min_pose_confidence,
                min_part_confidence: self.single_pose_detection.min_part_confidence,
            },
            Algorithm::MultiPose => PoseThresholds {
                min_pose_confidence: self.multi_pose_detection.min_pose_confidence,
                min_part_confidence: self.multi_pose_detection.min_part_confidence,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputOptions {
    pub show_video: bool,
    pub show_skeleton: bool,
    pub show_points: bool,
    pub color: Color,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            show_video: true,
            show_skeleton: true,
            show_points: true,
            color: Color::CYAN,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub estimation: EstimationConfig,
    pub output: OutputOptions,
    /// Architecture requested by the control surface but not yet loaded.
    #[serde(skip)]
    pub pending_architecture: Option<Architecture>,
    /// Architecture of the model the estimation loop holds, if any.
    #[serde(skip)]
    pub loaded_architecture: Option<Architecture>,
    #[serde(skip)]
    pub swap_in_progress: bool,
}

impl OverlayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut config: OverlayConfig = serde_json::from_str(json)?;
        config.clamp();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    /// Pulls every numeric parameter back into its supported range.
    pub fn clamp(&mut self) {
        let est = &mut self.estimation;
        est.image_scale_factor = clamp_finite(est.image_scale_factor, 0.2, 1.0, 0.5);

        let single = &mut est.single_pose_detection;
        single.min_pose_confidence = clamp_finite(single.min_pose_confidence, 0.0, 1.0, 0.1);
        single.min_part_confidence = clamp_finite(single.min_part_confidence, 0.0, 1.0, 0.5);

        let multi = &mut est.multi_pose_detection;
        multi.max_pose_detections = multi.max_pose_detections.clamp(1, 20);
        multi.min_pose_confidence = clamp_finite(multi.min_pose_confidence, 0.0, 1.0, 0.1);
        multi.min_part_confidence = clamp_finite(multi.min_part_confidence, 0.0, 1.0, 0.3);
        multi.nms_radius = clamp_finite(multi.nms_radius, 0.0, 40.0, 20.0);
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.estimation.architecture, Architecture::MobileNet101);
        assert_eq!(config.estimation.output_stride.as_u32(), 16);
        assert_relative_eq!(config.estimation.image_scale_factor, 0.5);
        assert_eq!(config.estimation.multi_pose_detection.max_pose_detections, 2);
        assert_relative_eq!(config.estimation.multi_pose_detection.nms_radius, 20.0);
        assert!(config.output.show_video && config.output.show_skeleton && config.output.show_points);
        assert_eq!(config.output.color, Color::CYAN);
        assert!(config.pending_architecture.is_none());
    }

    #[rstest]
    #[case::single(Algorithm::SinglePose, 0.1, 0.5)]
    #[case::multi(Algorithm::MultiPose, 0.1, 0.3)]
    fn test_thresholds_follow_algorithm(
        #[case] algorithm: Algorithm,
        #[case] min_pose: f32,
        #[case] min_part: f32,
    ) {
        let config = EstimationConfig {
            algorithm,
            ..EstimationConfig::default()
        };
        let t = config.thresholds();
        assert_relative_eq!(t.min_pose_confidence, min_pose);
        assert_relative_eq!(t.min_part_confidence, min_part);
    }

    #[test]
    fn test_clamp_pulls_values_into_range() {
        let mut config = OverlayConfig::default();
        config.estimation.image_scale_factor = 3.0;
        config.estimation.multi_pose_detection.max_pose_detections = 0;
        config.estimation.multi_pose_detection.nms_radius = 99.0;
        config.estimation.single_pose_detection.min_part_confidence = -1.0;

        config.clamp();

        assert_relative_eq!(config.estimation.image_scale_factor, 1.0);
        assert_eq!(config.estimation.multi_pose_detection.max_pose_detections, 1);
        assert_relative_eq!(config.estimation.multi_pose_detection.nms_radius, 40.0);
        assert_relative_eq!(config.estimation.single_pose_detection.min_part_confidence, 0.0);
    }

    #[test]
    fn test_clamp_replaces_nan_with_default() {
        let mut config = OverlayConfig::default();
        config.estimation.image_scale_factor = f32::NAN;
        config.clamp();
        assert_relative_eq!(config.estimation.image_scale_factor, 0.5);
    }

    #[rstest]
    #[case::w050(Architecture::MobileNet050, "posenet_mobilenet_050.onnx")]
    #[case::w075(Architecture::MobileNet075, "posenet_mobilenet_075.onnx")]
    #[case::w100(Architecture::MobileNet100, "posenet_mobilenet_100.onnx")]
    #[case::w101(Architecture::MobileNet101, "posenet_mobilenet_101.onnx")]
    fn test_model_file_name(#[case] arch: Architecture, #[case] expected: &str) {
        assert_eq!(arch.model_file_name(), expected);
    }

    #[rstest]
    #[case("0.5", Architecture::MobileNet050)]
    #[case("0.75", Architecture::MobileNet075)]
    #[case("1.00", Architecture::MobileNet100)]
    #[case("1.01", Architecture::MobileNet101)]
    fn test_parse_architecture(#[case] input: &str, #[case] expected: Architecture) {
        assert_eq!(input.parse::<Architecture>().unwrap(), expected);
    }

    #[test]
    fn test_parse_stride_rejects_unsupported() {
        assert!("12".parse::<OutputStride>().is_err());
        assert_eq!("32".parse::<OutputStride>().unwrap(), OutputStride::ThirtyTwo);
    }

    #[test]
    fn test_parse_algorithm_accepts_short_names() {
        assert_eq!("multi".parse::<Algorithm>().unwrap(), Algorithm::MultiPose);
        assert_eq!("single-pose".parse::<Algorithm>().unwrap(), Algorithm::SinglePose);
    }

    #[test]
    fn test_partial_preset_keeps_defaults() {
        let json = r##"{
            "estimation": { "algorithm": "multi-pose", "outputStride": 8, "architecture": "0.75" },
            "output": { "showVideo": false, "color": "#ff0000" }
        }"##;
        let config = OverlayConfig::from_json_str(json).unwrap();
        assert_eq!(config.estimation.algorithm, Algorithm::MultiPose);
        assert_eq!(config.estimation.output_stride, OutputStride::Eight);
        assert_eq!(config.estimation.architecture, Architecture::MobileNet075);
        assert_relative_eq!(config.estimation.image_scale_factor, 0.5);
        assert!(!config.output.show_video);
        assert!(config.output.show_points);
        assert_eq!(config.output.color, Color::new(255, 0, 0));
    }

    #[test]
    fn test_preset_is_clamped() {
        let json = r#"{ "estimation": { "imageScaleFactor": 0.01 } }"#;
        let config = OverlayConfig::from_json_str(json).unwrap();
        assert_relative_eq!(config.estimation.image_scale_factor, 0.2);
    }

    #[test]
    fn test_invalid_stride_in_preset_is_parse_error() {
        let json = r#"{ "estimation": { "outputStride": 10 } }"#;
        assert!(matches!(
            OverlayConfig::from_json_str(json),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_runtime_fields_are_not_serialized() {
        let config = OverlayConfig {
            pending_architecture: Some(Architecture::MobileNet050),
            loaded_architecture: Some(Architecture::MobileNet101),
            swap_in_progress: true,
            ..OverlayConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("pending"));
        assert!(!json.contains("swap"));
        assert!(!json.contains("loaded"));
        let back = OverlayConfig::from_json_str(&json).unwrap();
        assert!(back.pending_architecture.is_none());
        assert!(back.loaded_architecture.is_none());
        assert!(!back.swap_in_progress);
    }

    #[test]
    fn test_load_from_missing_file_is_read_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = OverlayConfig::load_from(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
