pub mod byte_source;
pub mod media_event;
pub mod media_platform;
pub mod media_resource;
pub mod video_reader;
