use std::path::PathBuf;

use crate::config::overlay_config::Architecture;
use crate::estimation::domain::pose_net::{InferenceError, PoseNet, PoseNetLoader};
use crate::shared::model_resolver::{self, ProgressFn};

use super::onnx_pose_net::OnnxPoseNet;

/// Resolves `posenet_mobilenet_<arch>.onnx` and opens it with ONNX Runtime.
pub struct OnnxPoseNetLoader {
    model_dir: Option<PathBuf>,
    base_url: Option<String>,
}

impl OnnxPoseNetLoader {
    pub fn new(model_dir: Option<PathBuf>, base_url: Option<String>) -> Self {
        Self { model_dir, base_url }
    }
}

impl PoseNetLoader for OnnxPoseNetLoader {
    fn load(&self, architecture: Architecture) -> Result<Box<dyn PoseNet>, InferenceError> {
        let name = architecture.model_file_name();
        let progress: ProgressFn = Box::new(|downloaded, total| {
            if total > 0 {
                log::debug!("Model download: {downloaded}/{total} bytes");
            }
        });
        let path = model_resolver::resolve(
            &name,
            self.base_url.as_deref(),
            self.model_dir.as_deref(),
            Some(progress),
        )
        .map_err(|e| InferenceError::Load {
            architecture,
            reason: e.to_string(),
        })?;

        let pose_net = OnnxPoseNet::new(&path, architecture).map_err(|e| InferenceError::Load {
            architecture,
            reason: e.to_string(),
        })?;
        Ok(Box::new(pose_net))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(architecture: Architecture) -> bool {
        model_resolver::model_cache_dir()
            .map(|dir| dir.join(architecture.model_file_name()).exists())
            .unwrap_or(false)
    }

    #[test]
    fn test_missing_model_without_url_is_load_error() {
        if cached(Architecture::MobileNet050) {
            return;
        }
        let tmp = tempfile::TempDir::new().unwrap();
        let loader = OnnxPoseNetLoader::new(Some(tmp.path().to_path_buf()), None);
        match loader.load(Architecture::MobileNet050) {
            Err(InferenceError::Load { architecture, reason }) => {
                assert_eq!(architecture, Architecture::MobileNet050);
                assert!(reason.contains("posenet_mobilenet_050.onnx"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a load failure"),
        }
    }

    #[test]
    fn test_corrupt_model_file_is_load_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        if cached(Architecture::MobileNet075) {
            return;
        }
        let name = Architecture::MobileNet075.model_file_name();
        std::fs::write(tmp.path().join(name), b"not an onnx model").unwrap();
        let loader = OnnxPoseNetLoader::new(Some(tmp.path().to_path_buf()), None);
        assert!(matches!(
            loader.load(Architecture::MobileNet075),
            Err(InferenceError::Load { .. })
        ));
    }
}
