//! Bitmap-font text.
//!
//! A [`FontAtlas`] maps characters to sub-rectangles of one texture and
//! drives the renderer's textured quads. [`bake_font`] builds one from a
//! TrueType font with `fontdue`.

mod atlas;
mod bake;

pub use atlas::{FontAtlas, Glyph};
pub use bake::{bake_font, FontLoadError, ASCII};
