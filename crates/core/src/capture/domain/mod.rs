pub mod artifact_exporter;
pub mod capture_session;
pub mod stream_recorder;
