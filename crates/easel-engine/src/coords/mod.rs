//! Coordinate and geometry types.
//!
//! Canvas space:
//! - pixels, origin top-left
//! - +X right, +Y down
//!
//! The batch shader converts to clip space with the projection from
//! [`Viewport::ortho`].

mod color;
mod rect;
mod vec2;
mod viewport;

pub use color::ColorRgba;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
