use crate::estimation::domain::pose::Position;
use crate::shared::color::Color;

/// One primitive for a raster surface. Coordinates are surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCommand {
    Point {
        center: Position,
        radius: u32,
        color: Color,
    },
    Segment {
        from: Position,
        to: Position,
        width: u32,
        color: Color,
    },
}
