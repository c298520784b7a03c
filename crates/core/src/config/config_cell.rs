use std::sync::{Arc, PoisonError, RwLock};

use super::overlay_config::{Architecture, OverlayConfig};

/// Creates the shared configuration cell.
///
/// There is exactly one [`ConfigWriter`] (the control surface). Readers are
/// cloned freely by the estimation loop and the capture pipeline; the only
/// fields they may write are the swap state (flag and loaded model) and the
/// output flags a capture overlay mode imposes.
pub fn config_cell(initial: OverlayConfig) -> (ConfigWriter, ConfigReader) {
    let mut initial = initial;
    initial.clamp();
    let inner = Arc::new(RwLock::new(initial));
    (
        ConfigWriter {
            inner: Arc::clone(&inner),
        },
        ConfigReader { inner },
    )
}

pub struct ConfigWriter {
    inner: Arc<RwLock<OverlayConfig>>,
}

impl ConfigWriter {
    /// Applies a mutation, then clamps the result. An architecture change
    /// schedules a model swap like [`ConfigWriter::request_architecture`].
    pub fn update(&self, f: impl FnOnce(&mut OverlayConfig)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.estimation.architecture;
        f(&mut guard);
        guard.clamp();
        if guard.estimation.architecture != before {
            schedule_swap(&mut guard);
        }
    }

    /// Records a model change. The estimation loop picks it up at the start
    /// of its next iteration.
    pub fn request_architecture(&self, architecture: Architecture) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.estimation.architecture = architecture;
        schedule_swap(&mut guard);
    }

    pub fn swap_in_progress(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .swap_in_progress
    }

    pub fn reader(&self) -> ConfigReader {
        ConfigReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Marks the configured architecture for loading unless it is already the
/// loaded one. With nothing loaded the loop's start picks it up directly.
fn schedule_swap(config: &mut OverlayConfig) {
    let wanted = config.estimation.architecture;
    config.pending_architecture = match config.loaded_architecture {
        Some(loaded) if loaded != wanted => Some(wanted),
        _ => None,
    };
}

#[derive(Clone)]
pub struct ConfigReader {
    inner: Arc<RwLock<OverlayConfig>>,
}

impl ConfigReader {
    pub fn snapshot(&self) -> OverlayConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes the pending architecture, if any, and raises the swap flag.
    /// Requests arriving during the swap compare against the incoming model.
    pub(crate) fn begin_architecture_swap(&self) -> Option<Architecture> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let pending = guard.pending_architecture.take()?;
        guard.swap_in_progress = true;
        guard.loaded_architecture = Some(pending);
        Some(pending)
    }

    pub(crate) fn finish_architecture_swap(&self) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.swap_in_progress = false;
    }

    /// Records which model the loop now holds; `None` after a failed load.
    pub(crate) fn set_loaded_architecture(&self, architecture: Option<Architecture>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.loaded_architecture = architecture;
        if architecture.is_some() && architecture == guard.pending_architecture {
            guard.pending_architecture = None;
        }
    }

    pub(crate) fn set_output_flags(&self, show_video: bool, show_skeleton: bool) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.output.show_video = show_video;
        guard.output.show_skeleton = show_skeleton;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::overlay_config::Algorithm;

    #[test]
    fn test_reader_sees_writer_updates() {
        let (writer, reader) = config_cell(OverlayConfig::default());
        writer.update(|c| c.estimation.algorithm = Algorithm::MultiPose);
        assert_eq!(reader.snapshot().estimation.algorithm, Algorithm::MultiPose);
    }

    #[test]
    fn test_update_clamps() {
        let (writer, reader) = config_cell(OverlayConfig::default());
        writer.update(|c| c.estimation.multi_pose_detection.max_pose_detections = 50);
        assert_eq!(reader.snapshot().estimation.multi_pose_detection.max_pose_detections, 20);
    }

    #[test]
    fn test_initial_config_is_clamped() {
        let mut initial = OverlayConfig::default();
        initial.estimation.image_scale_factor = 0.0;
        let (_writer, reader) = config_cell(initial);
        assert!((reader.snapshot().estimation.image_scale_factor - 0.2).abs() < f32::EPSILON);
    }

    fn loaded_cell(architecture: Architecture) -> (ConfigWriter, ConfigReader) {
        let (writer, reader) = config_cell(OverlayConfig::default());
        reader.set_loaded_architecture(Some(architecture));
        (writer, reader)
    }

    #[test]
    fn test_architecture_swap_handshake() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.request_architecture(Architecture::MobileNet050);

        assert_eq!(reader.begin_architecture_swap(), Some(Architecture::MobileNet050));
        assert!(writer.swap_in_progress());
        assert_eq!(reader.begin_architecture_swap(), None);

        reader.finish_architecture_swap();
        assert!(!writer.swap_in_progress());
        assert_eq!(reader.snapshot().estimation.architecture, Architecture::MobileNet050);
    }

    #[test]
    fn test_requesting_loaded_architecture_is_noop() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.request_architecture(Architecture::MobileNet101);
        assert_eq!(reader.begin_architecture_swap(), None);
    }

    #[test]
    fn test_request_before_first_load_is_left_to_start() {
        let (writer, reader) = config_cell(OverlayConfig::default());
        writer.request_architecture(Architecture::MobileNet075);
        assert_eq!(reader.begin_architecture_swap(), None);
        assert_eq!(reader.snapshot().estimation.architecture, Architecture::MobileNet075);
    }

    #[test]
    fn test_update_changing_architecture_schedules_swap() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.update(|c| c.estimation.architecture = Architecture::MobileNet050);
        assert_eq!(reader.begin_architecture_swap(), Some(Architecture::MobileNet050));
    }

    #[test]
    fn test_update_without_architecture_change_schedules_nothing() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.update(|c| c.estimation.algorithm = Algorithm::MultiPose);
        assert_eq!(reader.begin_architecture_swap(), None);
    }

    #[test]
    fn test_request_after_update_is_not_lost() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.update(|c| c.estimation.architecture = Architecture::MobileNet050);
        writer.request_architecture(Architecture::MobileNet050);
        assert_eq!(reader.begin_architecture_swap(), Some(Architecture::MobileNet050));
    }

    #[test]
    fn test_switching_back_to_loaded_cancels_pending_swap() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.request_architecture(Architecture::MobileNet050);
        writer.request_architecture(Architecture::MobileNet101);
        assert_eq!(reader.begin_architecture_swap(), None);
    }

    #[test]
    fn test_request_during_swap_reschedules_previous_model() {
        let (writer, reader) = loaded_cell(Architecture::MobileNet101);
        writer.request_architecture(Architecture::MobileNet050);
        reader.begin_architecture_swap();

        writer.request_architecture(Architecture::MobileNet101);
        reader.set_loaded_architecture(Some(Architecture::MobileNet050));
        reader.finish_architecture_swap();

        assert_eq!(reader.begin_architecture_swap(), Some(Architecture::MobileNet101));
    }

    #[test]
    fn test_cloned_readers_share_state() {
        let (_writer, reader) = config_cell(OverlayConfig::default());
        let other = reader.clone();
        reader.set_output_flags(false, true);
        let output = other.snapshot().output;
        assert!(!output.show_video);
        assert!(output.show_skeleton);
    }
}
