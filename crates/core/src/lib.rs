pub mod capture;
pub mod config;
pub mod estimation;
pub mod pipeline;
pub mod rendering;
pub mod resource;
pub mod shared;
