use std::fmt;
use std::ops::RangeInclusive;

use image::{Rgba, RgbaImage};

use crate::assets::AssetLoader;

use super::atlas::{FontAtlas, Glyph};

/// Printable ASCII, the default bake set.
pub const ASCII: RangeInclusive<char> = ' '..='~';

const MIN_ATLAS_WIDTH: u32 = 512;
const GLYPH_PADDING: u32 = 1;

/// Error returned by [`bake_font`].
#[derive(Debug, Clone)]
pub struct FontLoadError(pub String);

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font load error: {}", self.0)
    }
}

impl std::error::Error for FontLoadError {}

/// Rasterizes `charset` from a TrueType/OpenType font into a [`FontAtlas`].
///
/// Glyphs are shelf-packed into one white RGBA texture whose alpha is the
/// coverage. The texture is queued on `loader` and becomes ready on its
/// next poll. Characters the font has no outline for are skipped, so
/// drawing them later reports a missing glyph.
pub fn bake_font(
    ttf: &[u8],
    px: f32,
    charset: impl IntoIterator<Item = char>,
    loader: &mut AssetLoader,
) -> Result<FontAtlas, FontLoadError> {
    if !(px > 0.0 && px.is_finite()) {
        return Err(FontLoadError(format!("invalid pixel size {px}")));
    }

    let settings = fontdue::FontSettings { scale: px, ..fontdue::FontSettings::default() };
    let font = fontdue::Font::from_bytes(ttf, settings).map_err(|e| FontLoadError(e.to_string()))?;

    let chars: Vec<char> = charset
        .into_iter()
        .filter(|&c| c == ' ' || font.lookup_glyph_index(c) != 0)
        .collect();

    let rasters: Vec<_> = chars.iter().map(|&c| font.rasterize(c, px)).collect();
    let sizes: Vec<(u32, u32)> = rasters
        .iter()
        .map(|(m, _)| (m.width as u32, m.height as u32))
        .collect();

    let widest = sizes.iter().map(|s| s.0).max().unwrap_or(0);
    let width = MIN_ATLAS_WIDTH.max(widest + 2 * GLYPH_PADDING);
    let (positions, height) = shelf_pack(&sizes, width);

    let ascent = font
        .horizontal_line_metrics(px)
        .map_or(px, |lm| lm.ascent)
        .round() as i32;
    let line_height = font
        .horizontal_line_metrics(px)
        .map_or(px, |lm| lm.new_line_size)
        .ceil() as u32;

    let mut pixels = RgbaImage::new(width, height.max(1));
    let mut atlas_glyphs = Vec::with_capacity(chars.len());

    for ((&c, (metrics, coverage)), &(ax, ay)) in chars.iter().zip(&rasters).zip(&positions) {
        let (w, h) = (metrics.width as u32, metrics.height as u32);
        for gy in 0..h {
            for gx in 0..w {
                let a = coverage[(gy * w + gx) as usize];
                pixels.put_pixel(ax + gx, ay + gy, Rgba([255, 255, 255, a]));
            }
        }

        atlas_glyphs.push((
            c,
            Glyph {
                atlas_x: ax,
                atlas_y: ay,
                width: w,
                height: h,
                x_offset: metrics.xmin,
                y_offset: ascent - (metrics.ymin + h as i32),
                x_advance: metrics.advance_width.round() as i32,
            },
        ));
    }

    let mut atlas = FontAtlas::new(loader.queue_rgba(pixels));
    atlas.set_line_height(line_height);
    for (c, g) in atlas_glyphs {
        atlas.insert_glyph(c, g);
    }

    for &first in &chars {
        for &second in &chars {
            let Some(k) = font.horizontal_kern(first, second, px) else { continue };
            let k = k.round() as i32;
            if k != 0 {
                atlas.insert_kerning(first, second, k);
            }
        }
    }

    log::debug!(
        "baked {} glyphs at {px}px into a {width}x{} atlas",
        atlas.glyph_count(),
        height.max(1)
    );
    Ok(atlas)
}

/// Places boxes left to right in rows of `width`, starting a new row when
/// the next box would cross the right edge.
///
/// Returns each box's top-left corner and the total height used.
fn shelf_pack(sizes: &[(u32, u32)], width: u32) -> (Vec<(u32, u32)>, u32) {
    let mut x = GLYPH_PADDING;
    let mut y = GLYPH_PADDING;
    let mut row_height = 0;
    let mut out = Vec::with_capacity(sizes.len());

    for &(w, h) in sizes {
        if x + w + GLYPH_PADDING > width {
            x = GLYPH_PADDING;
            y += row_height + GLYPH_PADDING;
            row_height = 0;
        }
        out.push((x, y));
        x += w + GLYPH_PADDING;
        row_height = row_height.max(h);
    }

    (out, y + row_height + GLYPH_PADDING)
}
