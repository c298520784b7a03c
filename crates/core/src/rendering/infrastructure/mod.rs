pub mod image_surface;
pub mod png_snapshot_writer;
