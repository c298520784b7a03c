use crate::shared::frame::Frame;

use super::draw_command::DrawCommand;

/// The 2D surface the estimation loop draws each frame onto and a capture
/// stream samples from.
pub trait RasterSurface: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Resizes and clears the surface.
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// Draws `frame` mirrored left-to-right, scaled to the surface.
    fn draw_frame_mirrored(&mut self, frame: &Frame);

    fn apply(&mut self, command: &DrawCommand);

    fn apply_all(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            self.apply(command);
        }
    }

    /// Copy of the current contents.
    fn snapshot(&self) -> Frame;
}
