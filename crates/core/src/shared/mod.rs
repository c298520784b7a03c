pub mod color;
pub mod constants;
pub mod frame;
pub mod model_resolver;
pub mod video_metadata;

#[cfg(test)]
pub(crate) mod test_support;
