use crate::coords::ColorRgba;

/// Opaque RGB color with 8-bit channels (`0`–`255`).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from integer channels, clamping each into `0..=255`.
    ///
    /// Sketches often compute channels from mouse positions or frame counts;
    /// anything outside the byte range saturates instead of wrapping.
    #[inline]
    pub fn clamped(r: i32, g: i32, b: i32) -> Self {
        let c = |v: i32| v.clamp(0, 255) as u8;
        Self::rgb(c(r), c(g), c(b))
    }

    /// Normalized color with alpha fixed at 1.
    #[inline]
    pub fn to_rgba(self) -> ColorRgba {
        ColorRgba::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            1.0,
        )
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::rgb(r, g, b)
    }
}
