pub mod config_cell;
pub mod overlay_config;
