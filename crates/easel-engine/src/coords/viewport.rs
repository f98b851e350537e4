use glam::Mat4;

/// Near/far planes of the canvas projection. Everything is drawn at `z = 0`.
const DEPTH_RANGE: (f32, f32) = (0.0, 100.0);

/// Canvas size in pixels, the basis for the orthographic projection.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Orthographic projection with the origin at the top-left corner and +Y down.
    ///
    /// `(0, 0)` maps to clip-space `(-1, 1)` and `(width, height)` to `(1, -1)`.
    pub fn ortho(self) -> Mat4 {
        let (near, far) = DEPTH_RANGE;
        Mat4::orthographic_rh(0.0, self.width, self.height, 0.0, near, far)
    }
}
