use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::shared::frame::Frame;

/// Largest size no greater than `dimension * scale` that the model's stride
/// divides into a whole grid: `k * stride + 1`.
pub fn valid_resolution(image_scale_factor: f32, dimension: u32, output_stride: u32) -> u32 {
    let even = ((dimension as f32 * image_scale_factor).floor() as i64 - 1).max(0);
    let stride = output_stride.max(1) as i64;
    (even - even % stride + 1) as u32
}

/// How a model expects its input tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputLayout {
    pub channels_first: bool,
    /// `(width, height)` when the model declares a static input size.
    pub fixed_size: Option<(u32, u32)>,
}

/// The model input plus what's needed to map results back to the frame.
pub struct PreparedInput {
    pub tensor: Array4<f32>,
    pub input_width: u32,
    pub input_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
}

/// Resizes (bilinear), optionally mirrors, and normalises a frame to [-1, 1].
pub fn prepare_input(
    frame: &Frame,
    input_width: u32,
    input_height: u32,
    flip_horizontal: bool,
    layout: InputLayout,
) -> Result<PreparedInput, String> {
    let image = frame
        .to_rgb_image()
        .ok_or_else(|| format!("expected an RGB frame, got {} channels", frame.channels()))?;
    let input_width = input_width.max(1);
    let input_height = input_height.max(1);

    let mut resized = imageops::resize(&image, input_width, input_height, FilterType::Triangle);
    if flip_horizontal {
        imageops::flip_horizontal_in_place(&mut resized);
    }

    let (h, w) = (input_height as usize, input_width as usize);
    let mut tensor = if layout.channels_first {
        Array4::<f32>::zeros((1, 3, h, w))
    } else {
        Array4::<f32>::zeros((1, h, w, 3))
    };
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = px.0[c] as f32 / 127.5 - 1.0;
            if layout.channels_first {
                tensor[[0, c, y as usize, x as usize]] = v;
            } else {
                tensor[[0, y as usize, x as usize, c]] = v;
            }
        }
    }

    Ok(PreparedInput {
        tensor,
        input_width,
        input_height,
        scale_x: frame.width() as f32 / input_width as f32,
        scale_y: frame.height() as f32 / input_height as f32,
    })
}
