use std::collections::HashMap;

use crate::assets::ImageHandle;
use crate::coords::{Rect, Vec2};
use crate::render::{DrawError, DrawTarget, Renderer};

/// Placement of one character inside the atlas texture.
///
/// Offsets are applied to the pen position; `y_offset` is measured down
/// from the top of the line.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Glyph {
    pub atlas_x: u32,
    pub atlas_y: u32,
    pub width: u32,
    pub height: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub x_advance: i32,
}

/// Character → glyph lookup plus pair kerning, backed by one atlas texture.
///
/// The texture arrives asynchronously; until it does, drawing is a no-op.
#[derive(Debug, Clone, Default)]
pub struct FontAtlas {
    glyphs: HashMap<char, Glyph>,
    kerning: HashMap<(char, char), i32>,
    line_height: u32,
    image: ImageHandle,
}

impl FontAtlas {
    pub fn new(image: ImageHandle) -> Self {
        Self {
            image,
            ..Self::default()
        }
    }

    pub fn insert_glyph(&mut self, c: char, glyph: Glyph) {
        self.glyphs.insert(c, glyph);
    }

    /// Adjustment applied when `second` directly follows `first`.
    pub fn insert_kerning(&mut self, first: char, second: char, amount: i32) {
        self.kerning.insert((first, second), amount);
    }

    pub fn set_line_height(&mut self, px: u32) {
        self.line_height = px;
    }

    pub fn line_height(&self) -> u32 {
        self.line_height
    }

    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c)
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Kerning for the ordered pair; 0 when the pair has no entry.
    pub fn kerning(&self, first: char, second: char) -> i32 {
        self.kerning.get(&(first, second)).copied().unwrap_or(0)
    }

    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Pen advance of `text` in pixels, kerning included.
    pub fn measure(&self, text: &str) -> Result<i32, DrawError> {
        let mut width = 0;
        let mut prev = None;
        for c in text.chars() {
            let g = self.glyph(c).ok_or(DrawError::MissingGlyph(c))?;
            let kern = prev.map_or(0, |p| self.kerning(p, c));
            width += g.x_advance + kern;
            prev = Some(c);
        }
        Ok(width)
    }

    /// Draws `text` with its pen starting at `(x, y)`.
    ///
    /// Whatever is staged is flushed first and the glyphs are flushed as one
    /// textured batch afterwards. Every character is looked up before
    /// anything is staged, so a missing glyph leaves the batch untouched.
    /// While the atlas texture is still loading nothing is drawn.
    pub fn draw_string(
        &self,
        renderer: &mut Renderer,
        t: &mut DrawTarget<'_>,
        text: &str,
        x: f32,
        y: f32,
    ) -> Result<(), DrawError> {
        let Some(atlas) = self.image.get() else {
            log::debug!("font atlas still loading; dropped {text:?}");
            return Ok(());
        };

        let glyphs = text
            .chars()
            .map(|c| self.glyph(c).map(|g| (c, *g)).ok_or(DrawError::MissingGlyph(c)))
            .collect::<Result<Vec<_>, _>>()?;

        renderer.flush(t);

        let atlas_size = Vec2::new(atlas.width as f32, atlas.height as f32);
        let mut pen = x;
        let mut prev = None;

        for (c, g) in glyphs {
            let kern = prev.map_or(0, |p| self.kerning(p, c)) as f32;
            if g.width > 0 && g.height > 0 {
                let (w, h) = (g.width as f32, g.height as f32);
                let sub = Rect::new(g.atlas_x as f32, g.atlas_y as f32, w, h);
                let dest = Rect::new(pen + g.x_offset as f32 + kern, y + g.y_offset as f32, w, h);
                renderer.push_textured_quad(t, atlas.texture, atlas_size, sub, dest);
            }
            pen += g.x_advance as f32 + kern;
            prev = Some(c);
        }

        renderer.flush_textured(t, atlas.texture);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetLoader;
    use crate::coords::{ColorRgba, Viewport};
    use crate::device::RecordingBackend;
    use crate::render::GpuHandles;
    use glam::Mat4;
    use image::RgbaImage;

    fn glyph(atlas_x: u32, advance: i32) -> Glyph {
        Glyph {
            atlas_x,
            atlas_y: 0,
            width: 8,
            height: 10,
            x_offset: 1,
            y_offset: 2,
            x_advance: advance,
        }
    }

    fn font() -> FontAtlas {
        let mut f = FontAtlas::new(ImageHandle::pending());
        f.insert_glyph('A', glyph(0, 9));
        f.insert_glyph('V', glyph(8, 9));
        f.insert_glyph(' ', Glyph { x_advance: 4, ..Glyph::default() });
        f.insert_kerning('A', 'V', -2);
        f
    }

    struct Rig {
        gl: RecordingBackend,
        gpu: GpuHandles,
        projection: Mat4,
        renderer: Renderer,
    }

    impl Rig {
        fn new() -> Self {
            let mut gl = RecordingBackend::new();
            let gpu = GpuHandles::create(&mut gl).unwrap();
            gl.clear_calls();
            Self {
                gl,
                gpu,
                projection: Viewport::new(200.0, 200.0).ortho(),
                renderer: Renderer::new(600).unwrap(),
            }
        }

        fn ready(&mut self, f: FontAtlas) -> FontAtlas {
            let mut loader = AssetLoader::new();
            let h = loader.queue_rgba(RgbaImage::new(64, 16));
            loader.poll(&mut self.gl);
            self.gl.clear_calls();
            FontAtlas { image: h, ..f }
        }

        fn draw(&mut self, f: &FontAtlas, text: &str) -> Result<(), DrawError> {
            let mut t = DrawTarget {
                gl: &mut self.gl,
                gpu: &self.gpu,
                projection: &self.projection,
            };
            f.draw_string(&mut self.renderer, &mut t, text, 10.0, 20.0)
        }
    }

    // ── kerning ───────────────────────────────────────────────────────────

    #[test]
    fn unpaired_kerning_defaults_to_zero() {
        let f = font();
        assert_eq!(f.kerning('V', 'A'), 0);
        assert_eq!(f.kerning('A', 'V'), -2);
    }

    #[test]
    fn measure_includes_kerning() {
        assert_eq!(font().measure("AV").unwrap(), 16);
        assert_eq!(font().measure("A A").unwrap(), 22);
    }

    // ── draw_string ───────────────────────────────────────────────────────

    #[test]
    fn pending_atlas_draws_nothing() {
        let mut rig = Rig::new();
        rig.draw(&font(), "AV").unwrap();
        assert!(rig.gl.calls().is_empty());
        assert!(rig.renderer.batch().is_empty());
    }

    #[test]
    fn glyphs_follow_pen_and_kerning() {
        let mut rig = Rig::new();
        let f = rig.ready(font());
        rig.draw(&f, "AV").unwrap();

        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 1);
        let d = &draws[0];
        assert_eq!(d.texture_flag, Some(1.0));
        assert_eq!(d.texture, f.image().get().map(|i| i.texture));
        assert_eq!(d.vertex_count(), 8);

        // Origin corner is the last vertex of each quad.
        let origin = |q: usize| (d.vertices[(q * 4 + 3) * 9], d.vertices[(q * 4 + 3) * 9 + 1]);
        assert_eq!(origin(0), (11.0, 22.0));
        // pen 10 + advance 9 = 19, kern -2, x_offset 1.
        assert_eq!(origin(1), (18.0, 22.0));
    }

    #[test]
    fn glyph_uvs_address_atlas_cells() {
        let mut rig = Rig::new();
        let f = rig.ready(font());
        rig.draw(&f, "V").unwrap();
        let d = &rig.gl.draw_calls()[0];
        // Origin corner of 'V' sits at atlas x 8 of 64.
        assert_eq!((d.vertices[3 * 9 + 7], d.vertices[3 * 9 + 8]), (0.125, 0.0));
    }

    #[test]
    fn text_flushes_pending_solid_batch_first() {
        let mut rig = Rig::new();
        let f = rig.ready(font());
        {
            let mut t = DrawTarget { gl: &mut rig.gl, gpu: &rig.gpu, projection: &rig.projection };
            rig.renderer.push_rect(&mut t, Rect::new(0.0, 0.0, 5.0, 5.0), ColorRgba::black());
        }
        rig.draw(&f, "A").unwrap();
        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].texture_flag, Some(0.0));
        assert_eq!(draws[1].texture_flag, Some(1.0));
        assert!(rig.renderer.batch().is_empty());
    }

    #[test]
    fn blank_glyphs_advance_without_geometry() {
        let mut rig = Rig::new();
        let f = rig.ready(font());
        rig.draw(&f, "A A").unwrap();
        let d = &rig.gl.draw_calls()[0];
        assert_eq!(d.vertex_count(), 8);
        // second 'A' at pen 10 + 9 + 4, plus x_offset.
        assert_eq!(d.vertices[(4 + 3) * 9], 24.0);
    }

    #[test]
    fn missing_glyph_fails_before_staging() {
        let mut rig = Rig::new();
        let f = rig.ready(font());
        let err = rig.draw(&f, "AZ").unwrap_err();
        assert_eq!(err, DrawError::MissingGlyph('Z'));
        assert!(rig.gl.calls().is_empty());
        assert!(rig.renderer.batch().is_empty());
    }
}
