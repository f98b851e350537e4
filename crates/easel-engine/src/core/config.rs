use crate::render::DEFAULT_CAPACITY;

/// Startup parameters for one sketch.
#[derive(Debug, Clone)]
pub struct SketchConfig {
    /// Window title.
    pub title: String,

    /// Initial canvas size in pixels.
    pub width: u32,
    pub height: u32,

    /// Whether window resizes reflow the canvas. When `false` the window is
    /// forced back to the current canvas size.
    pub resizeable: bool,

    /// Batch capacity in indices, `6..=65536`.
    pub batch_capacity: usize,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            title: "easel".to_string(),
            width: 200,
            height: 200,
            resizeable: true,
            batch_capacity: DEFAULT_CAPACITY,
        }
    }
}
