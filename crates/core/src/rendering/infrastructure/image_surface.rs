use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::estimation::domain::pose::Position;
use crate::rendering::domain::draw_command::DrawCommand;
use crate::rendering::domain::raster_surface::RasterSurface;
use crate::shared::color::Color;
use crate::shared::frame::Frame;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// CPU raster surface backed by an `image::RgbImage`.
pub struct ImageSurface {
    buffer: RgbImage,
    frames_drawn: usize,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbImage::from_pixel(width, height, BACKGROUND),
            frames_drawn: 0,
        }
    }

    fn plot(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x < 0 || y < 0 || x >= self.buffer.width() as i64 || y >= self.buffer.height() as i64 {
            return;
        }
        self.buffer.put_pixel(x as u32, y as u32, color);
    }

    fn fill_disc(&mut self, center: Position, radius: f32, color: Rgb<u8>) {
        let r = radius.max(0.5);
        let cx = center.x.round() as i64;
        let cy = center.y.round() as i64;
        let reach = r.ceil() as i64;
        let r2 = r * r;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if (dx * dx + dy * dy) as f32 <= r2 {
                    self.plot(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn stroke_segment(&mut self, from: Position, to: Position, width: u32, color: Rgb<u8>) {
        let half = width as f32 / 2.0;
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let p = Position::new(from.x + dx * t, from.y + dy * t);
            self.fill_disc(p, half, color);
        }
    }
}

fn rgb(color: Color) -> Rgb<u8> {
    Rgb(color.rgb())
}

impl RasterSurface for ImageSurface {
    fn width(&self) -> u32 {
        self.buffer.width()
    }

    fn height(&self) -> u32 {
        self.buffer.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.buffer = RgbImage::from_pixel(width, height, BACKGROUND);
    }

    fn clear(&mut self) {
        for px in self.buffer.pixels_mut() {
            *px = BACKGROUND;
        }
    }

    fn draw_frame_mirrored(&mut self, frame: &Frame) {
        let Some(source) = frame.to_rgb_image() else {
            log::warn!("Skipping passthrough of a {}-channel frame", frame.channels());
            return;
        };
        let mut scaled = if source.dimensions() == self.buffer.dimensions() {
            source
        } else {
            imageops::resize(&source, self.buffer.width(), self.buffer.height(), FilterType::Triangle)
        };
        imageops::flip_horizontal_in_place(&mut scaled);
        self.buffer = scaled;
        self.frames_drawn += 1;
    }

    fn apply(&mut self, command: &DrawCommand) {
        match *command {
            DrawCommand::Point { center, radius, color } => {
                self.fill_disc(center, radius as f32, rgb(color));
            }
            DrawCommand::Segment { from, to, width, color } => {
                self.stroke_segment(from, to, width, rgb(color));
            }
        }
    }

    fn snapshot(&self) -> Frame {
        Frame::from_rgb_image(self.buffer.clone(), self.frames_drawn)
    }
}
