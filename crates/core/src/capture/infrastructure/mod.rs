pub mod download_exporter;
pub mod ffmpeg_stream_recorder;
