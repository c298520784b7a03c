pub mod decoding_media_platform;
pub mod decoding_video_element;
pub mod ffmpeg_reader;
pub mod file_byte_source;
pub mod url_byte_source;
