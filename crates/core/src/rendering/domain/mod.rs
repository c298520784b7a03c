pub mod draw_command;
pub mod keypoint_renderer;
pub mod raster_surface;
pub mod snapshot_writer;
