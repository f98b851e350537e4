use super::Vec2;

/// Axis-aligned rectangle in canvas pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    /// Corners in the order quads are staged: far corner first, origin last.
    ///
    /// `[(x+w, y+h), (x, y+h), (x+w, y), (x, y)]`. Corners 1 and 2 are the
    /// diagonal shared by both triangles of the `[i, i+1, i+2, i+1, i+2, i+3]`
    /// index pattern.
    #[inline]
    pub fn quad_corners(self) -> [Vec2; 4] {
        let Vec2 { x, y } = self.origin;
        let Vec2 { x: x2, y: y2 } = self.max();
        [
            Vec2::new(x2, y2),
            Vec2::new(x, y2),
            Vec2::new(x2, y),
            Vec2::new(x, y),
        ]
    }

    /// Rectangle expressed as fractions of a `width` × `height` source.
    #[inline]
    pub fn normalized_by(self, width: f32, height: f32) -> Rect {
        Rect::new(
            self.origin.x / width,
            self.origin.y / height,
            self.size.x / width,
            self.size.y / height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    // ── quad_corners ──────────────────────────────────────────────────────

    #[test]
    fn quad_corners_start_at_far_corner() {
        let c = r(10.0, 20.0, 30.0, 40.0).quad_corners();
        assert_eq!(c[0], Vec2::new(40.0, 60.0));
        assert_eq!(c[3], Vec2::new(10.0, 20.0));
    }

    #[test]
    fn quad_corners_share_diagonal_in_middle() {
        let c = r(0.0, 0.0, 1.0, 1.0).quad_corners();
        assert_eq!(c[1], Vec2::new(0.0, 1.0));
        assert_eq!(c[2], Vec2::new(1.0, 0.0));
    }

    // ── normalized_by ─────────────────────────────────────────────────────

    #[test]
    fn normalized_by_divides_each_axis() {
        let n = r(16.0, 8.0, 32.0, 16.0).normalized_by(64.0, 32.0);
        assert_eq!(n, r(0.25, 0.25, 0.5, 0.5));
    }
}
