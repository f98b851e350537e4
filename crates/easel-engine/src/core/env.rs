use std::path::Path;

use crate::assets::{AssetLoader, ImageHandle};
use crate::coords::{Rect, Vec2};
use crate::device::GraphicsBackend;
use crate::paint::Color;
use crate::render::{DrawError, DrawTarget, RenderStats, Renderer};
use crate::text::{self, FontAtlas, FontLoadError};

use super::environment::Environment;

/// Drawing surface handed to sketch callbacks.
///
/// Wraps the frame loop's [`Environment`], the batch renderer, the backend
/// and the asset loader for the duration of one callback. Shapes are staged
/// into the batch and reach the GPU when it fills up, when another mode is
/// needed, or at the end of the frame.
pub struct Env<'a> {
    env: &'a mut Environment,
    renderer: &'a mut Renderer,
    gl: &'a mut dyn GraphicsBackend,
    assets: &'a mut AssetLoader,
}

impl<'a> Env<'a> {
    pub fn new(
        env: &'a mut Environment,
        renderer: &'a mut Renderer,
        gl: &'a mut dyn GraphicsBackend,
        assets: &'a mut AssetLoader,
    ) -> Self {
        Self { env, renderer, gl, assets }
    }

    fn split(&mut self) -> (&mut Renderer, DrawTarget<'_>) {
        let target = DrawTarget {
            gl: &mut *self.gl,
            gpu: &self.env.gpu,
            projection: &self.env.camera.projection,
        };
        (&mut *self.renderer, target)
    }

    // ── queries ───────────────────────────────────────────────────────────

    pub fn width(&self) -> u32 {
        self.env.size.width
    }

    pub fn height(&self) -> u32 {
        self.env.size.height
    }

    pub fn mouse(&self) -> Vec2 {
        self.env.mouse.pos
    }

    /// Mouse position at the end of the previous frame.
    pub fn pmouse(&self) -> Vec2 {
        self.env.mouse.prev_pos
    }

    pub fn mouse_pressed(&self) -> bool {
        self.env.mouse.pressed
    }

    pub fn frame_rate(&self) -> u32 {
        self.env.frame.rate
    }

    pub fn frame_count(&self) -> u64 {
        self.env.frame.count
    }

    pub fn stats(&self) -> RenderStats {
        self.renderer.stats()
    }

    pub fn environment(&self) -> &Environment {
        &*self.env
    }

    // ── drawing state ─────────────────────────────────────────────────────

    pub fn fill(&mut self, color: impl Into<Color>) {
        self.env.fill = color.into();
    }

    pub fn stroke(&mut self, color: impl Into<Color>) {
        self.env.stroke.color = color.into();
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.env.stroke.weight = weight;
    }

    /// Covers the whole canvas with `color`. The fill color is left as it was.
    pub fn background(&mut self, color: impl Into<Color>) {
        let color = color.into();
        self.env.background = color;
        let full = Rect::new(0.0, 0.0, self.env.size.width as f32, self.env.size.height as f32);
        let (renderer, mut t) = self.split();
        renderer.push_rect(&mut t, full, color.to_rgba());
    }

    // ── canvas ────────────────────────────────────────────────────────────

    /// Resizes the canvas and asks the window to follow.
    pub fn size(&mut self, width: u32, height: u32) {
        self.flush();
        if self.env.reset_size(&mut *self.gl, width, height) {
            self.env.request_size(width, height);
        }
    }

    pub fn resizeable(&mut self, resizeable: bool) {
        self.env.size.resizeable = resizeable;
    }

    /// Clears the canvas to the clear color. Geometry staged before the
    /// call is drawn first, so it is cleared too.
    pub fn clear(&mut self) {
        self.flush();
        self.gl.clear();
    }

    /// Draws everything staged so far.
    pub fn flush(&mut self) {
        let (renderer, mut t) = self.split();
        renderer.flush(&mut t);
    }

    // ── primitives ────────────────────────────────────────────────────────

    /// Filled rectangle in the fill color.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let color = self.env.fill.to_rgba();
        let (renderer, mut t) = self.split();
        renderer.push_rect(&mut t, Rect::new(x, y, width, height), color);
    }

    /// Segment in the stroke color and weight.
    pub fn line(&mut self, p1: impl Into<Vec2>, p2: impl Into<Vec2>) {
        let stroke = self.env.stroke;
        let (renderer, mut t) = self.split();
        renderer.push_line(&mut t, p1.into(), p2.into(), stroke.weight, stroke.color.to_rgba());
    }

    /// Filled ellipse in the fill color.
    pub fn ellipse(&mut self, center: impl Into<Vec2>, rx: f32, ry: f32) -> Result<(), DrawError> {
        let color = self.env.fill.to_rgba();
        let (renderer, mut t) = self.split();
        renderer.push_ellipse(&mut t, center.into(), rx, ry, color)
    }

    /// Draws `image` at its natural size. Nothing happens while it loads.
    pub fn image(&mut self, image: &ImageHandle, x: f32, y: f32) {
        if let Some(img) = image.get() {
            self.image_scaled(image, x, y, img.width as f32, img.height as f32);
        } else {
            log::debug!("image still loading; skipped draw at ({x}, {y})");
        }
    }

    /// Draws `image` stretched into `width` x `height`.
    pub fn image_scaled(&mut self, image: &ImageHandle, x: f32, y: f32, width: f32, height: f32) {
        let Some(img) = image.get() else {
            log::debug!("image still loading; skipped draw at ({x}, {y})");
            return;
        };
        let source = Vec2::new(img.width as f32, img.height as f32);
        let sub = Rect::new(0.0, 0.0, source.x, source.y);
        let (renderer, mut t) = self.split();
        renderer.push_textured_quad(&mut t, img.texture, source, sub, Rect::new(x, y, width, height));
    }

    /// Draws `text` with its pen starting at `(x, y)`.
    pub fn text(&mut self, font: &FontAtlas, text: &str, x: f32, y: f32) -> Result<(), DrawError> {
        let (renderer, mut t) = self.split();
        font.draw_string(renderer, &mut t, text, x, y)
    }

    // ── assets ────────────────────────────────────────────────────────────

    pub fn load_image(&mut self, path: impl AsRef<Path>) -> ImageHandle {
        self.assets.load_image(path)
    }

    pub fn load_image_bytes(&mut self, bytes: Vec<u8>) -> ImageHandle {
        self.assets.load_image_bytes(bytes)
    }

    /// Bakes printable ASCII from `ttf` at `px` pixels.
    ///
    /// The atlas texture arrives on a later frame; text drawn before then
    /// is skipped.
    pub fn load_font(&mut self, ttf: &[u8], px: f32) -> Result<FontAtlas, FontLoadError> {
        text::bake_font(ttf, px, text::ASCII, self.assets)
    }
}
