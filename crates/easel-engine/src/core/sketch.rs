use anyhow::Result;

use super::env::Env;

/// User program driven by the frame loop.
///
/// The sketch value is threaded through every callback: each one takes the
/// current state and returns the next. An error from any callback stops
/// the sketch.
///
/// Mouse callbacks run between frames; whatever they draw is staged and
/// reaches the canvas with the next frame.
pub trait Sketch: Sized {
    /// Runs once after the canvas exists. Drawing here ends up in the first
    /// frame.
    fn setup(env: &mut Env<'_>) -> Result<Self>;

    /// Runs once per frame.
    fn draw(self, _env: &mut Env<'_>) -> Result<Self> {
        Ok(self)
    }

    /// Pointer moved with no button held.
    fn mouse_move(self, _env: &mut Env<'_>) -> Result<Self> {
        Ok(self)
    }

    /// Pointer moved while a button is held.
    fn mouse_dragged(self, _env: &mut Env<'_>) -> Result<Self> {
        Ok(self)
    }

    fn mouse_down(self, _env: &mut Env<'_>) -> Result<Self> {
        Ok(self)
    }

    fn mouse_up(self, _env: &mut Env<'_>) -> Result<Self> {
        Ok(self)
    }
}
