use std::f32::consts::TAU;

use glam::Mat4;

use crate::coords::{ColorRgba, Rect, Vec2};
use crate::device::{
    AttribLocation, BufferId, BufferKind, GraphicsBackend, ProgramId, ShaderId, ShaderStage, TextureFilter,
    TextureId, UniformLocation,
};

use super::batch::{Batch, Vertex};
use super::error::{DrawError, SetupError};
use super::shaders::{
    ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_UV, BATCH_FRAGMENT_SHADER, BATCH_VERTEX_SHADER,
    UNIFORM_PROJECTION, UNIFORM_SAMPLER, UNIFORM_TEXTURE_FLAG,
};

/// GPU objects created once at startup and never reallocated.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GpuHandles {
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub program: ProgramId,
    pub a_position: AttribLocation,
    pub a_color: AttribLocation,
    pub a_uv: AttribLocation,
    pub u_projection: UniformLocation,
    pub u_texture_flag: UniformLocation,
    pub u_sampler: UniformLocation,
    /// 1×1 opaque white texture bound for solid draws.
    pub default_texture: TextureId,
}

impl GpuHandles {
    /// Compiles and links the batch program, then creates buffers and the
    /// default texture.
    ///
    /// Compile and link logs are reported through `log::error!` and carried
    /// in the returned error. Shaders are deleted once linked.
    pub fn create(gl: &mut dyn GraphicsBackend) -> Result<Self, SetupError> {
        let vs = compile(gl, ShaderStage::Vertex, BATCH_VERTEX_SHADER)?;
        let fs = match compile(gl, ShaderStage::Fragment, BATCH_FRAGMENT_SHADER) {
            Ok(fs) => fs,
            Err(e) => {
                gl.delete_shader(vs);
                return Err(e);
            }
        };

        let linked = gl.link_program(vs, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        let program = linked.map_err(|log| {
            log::error!("batch program link failed:\n{log}");
            SetupError::ProgramLink { log }
        })?;
        gl.use_program(program);

        let a_position = attrib(gl, program, ATTRIB_POSITION)?;
        let a_color = attrib(gl, program, ATTRIB_COLOR)?;
        let a_uv = attrib(gl, program, ATTRIB_UV)?;
        let u_projection = uniform(gl, program, UNIFORM_PROJECTION)?;
        let u_texture_flag = uniform(gl, program, UNIFORM_TEXTURE_FLAG)?;
        let u_sampler = uniform(gl, program, UNIFORM_SAMPLER)?;

        let vertex_buffer = gl.create_buffer(BufferKind::Vertex);
        let index_buffer = gl.create_buffer(BufferKind::Index);

        let default_texture = gl.create_texture();
        gl.upload_texture_rgba(default_texture, 1, 1, &[255, 255, 255, 255]);
        gl.set_texture_filter(
            default_texture,
            TextureFilter::LinearMipmapNearest,
            TextureFilter::Linear,
        );
        gl.generate_mipmaps(default_texture);

        gl.enable_alpha_blending();

        Ok(Self {
            vertex_buffer,
            index_buffer,
            program,
            a_position,
            a_color,
            a_uv,
            u_projection,
            u_texture_flag,
            u_sampler,
            default_texture,
        })
    }
}

fn attrib(
    gl: &mut dyn GraphicsBackend,
    program: ProgramId,
    name: &'static str,
) -> Result<AttribLocation, SetupError> {
    gl.attrib_location(program, name)
        .ok_or(SetupError::MissingAttribute(name))
}

fn uniform(
    gl: &mut dyn GraphicsBackend,
    program: ProgramId,
    name: &'static str,
) -> Result<UniformLocation, SetupError> {
    gl.uniform_location(program, name)
        .ok_or(SetupError::MissingUniform(name))
}

fn compile(
    gl: &mut dyn GraphicsBackend,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderId, SetupError> {
    gl.compile_shader(stage, source).map_err(|log| {
        log::error!("{stage} shader compile failed:\n{log}");
        SetupError::ShaderCompile { stage, log }
    })
}

/// What the staged geometry will be drawn as.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BatchMode {
    Solid,
    Textured(TextureId),
}

/// Counters since the renderer was created.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RenderStats {
    pub draw_calls: u64,
    /// Flushes forced because the next primitive did not fit.
    pub capacity_flushes: u64,
    /// Flushes forced because the next primitive needed another mode or texture.
    pub mode_flushes: u64,
}

/// Borrowed state a flush needs.
pub struct DrawTarget<'a> {
    pub gl: &'a mut dyn GraphicsBackend,
    pub gpu: &'a GpuHandles,
    pub projection: &'a Mat4,
}

/// Batch renderer: owns the staging buffers and the current batch mode.
///
/// Emitters reserve space first. A reservation that does not fit, or that
/// needs a different [`BatchMode`] than what is staged, flushes the staged
/// batch before anything is written, so a batch is always homogeneous and a
/// primitive never straddles a flush.
#[derive(Debug)]
pub struct Renderer {
    batch: Batch,
    mode: Option<BatchMode>,
    stats: RenderStats,
}

impl Renderer {
    pub fn new(capacity: usize) -> Result<Self, SetupError> {
        Ok(Self {
            batch: Batch::with_capacity(capacity)?,
            mode: None,
            stats: RenderStats::default(),
        })
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Mode of the staged geometry, `None` when nothing is staged.
    pub fn mode(&self) -> Option<BatchMode> {
        self.mode
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    // ── emitters ──────────────────────────────────────────────────────────

    /// Filled rectangle. Negative sizes extend left/up from `rect.origin`.
    pub fn push_rect(&mut self, t: &mut DrawTarget<'_>, rect: Rect, color: ColorRgba) {
        self.reserve(t, BatchMode::Solid, 4, 6);
        let base = self.batch.next_index();
        for p in rect.quad_corners() {
            self.batch.push_vertex(Vertex::solid(p, color));
        }
        self.batch.push_quad_indices(base);
    }

    /// Segment `p1`–`p2` widened to `weight` around its center line.
    ///
    /// A zero-length segment stages nothing.
    pub fn push_line(&mut self, t: &mut DrawTarget<'_>, p1: Vec2, p2: Vec2, weight: f32, color: ColorRgba) {
        let Some(off) = (p2 - p1).normal_scaled(weight / 2.0) else {
            return;
        };

        self.reserve(t, BatchMode::Solid, 4, 6);
        let base = self.batch.next_index();
        for p in [p1 + off, p2 + off, p1 - off, p2 - off] {
            self.batch.push_vertex(Vertex::solid(p, color));
        }
        self.batch.push_quad_indices(base);
    }

    /// Filled ellipse as a triangle fan over `round(2 * (|rx| + |ry|))` rim vertices.
    ///
    /// The first three rim vertices form the first triangle; every later
    /// vertex `i` adds `(first, i - 1, i)`. Fewer than three segments stage
    /// nothing.
    pub fn push_ellipse(
        &mut self,
        t: &mut DrawTarget<'_>,
        center: Vec2,
        rx: f32,
        ry: f32,
        color: ColorRgba,
    ) -> Result<(), DrawError> {
        let segments = (2.0 * (rx.abs() + ry.abs())).round();
        if !(segments >= 3.0) {
            return Ok(());
        }
        // Checked in floats: huge or infinite radii saturate the integer cast.
        let capacity = self.batch.capacity();
        let needed = (segments - 2.0) * 3.0;
        if needed >= capacity as f32 {
            return Err(DrawError::PrimitiveTooLarge {
                needed: needed as usize,
                capacity,
            });
        }
        let segments = segments as usize;
        let needed = needed as usize;

        self.reserve(t, BatchMode::Solid, segments, needed);
        let first = self.batch.next_index();
        let step = TAU / segments as f32;

        for i in 0..segments {
            let angle = i as f32 * step;
            let p = Vec2::new(center.x + rx * angle.cos(), center.y + ry * angle.sin());
            self.batch.push_vertex(Vertex::solid(p, color));

            let current = first + i as u16;
            if i < 3 {
                self.batch.push_index(current);
            } else {
                self.batch.push_index(first);
                self.batch.push_index(current - 1);
                self.batch.push_index(current);
            }
        }
        Ok(())
    }

    /// Textured quad: `sub` of a `source_size` texture drawn into `dest`.
    pub fn push_textured_quad(
        &mut self,
        t: &mut DrawTarget<'_>,
        texture: TextureId,
        source_size: Vec2,
        sub: Rect,
        dest: Rect,
    ) {
        self.reserve(t, BatchMode::Textured(texture), 4, 6);
        let base = self.batch.next_index();
        let uv = sub.normalized_by(source_size.x, source_size.y);
        for (p, st) in dest.quad_corners().into_iter().zip(uv.quad_corners()) {
            self.batch.push_vertex(Vertex::textured(p, st));
        }
        self.batch.push_quad_indices(base);
    }

    fn reserve(&mut self, t: &mut DrawTarget<'_>, mode: BatchMode, vertices: usize, indices: usize) {
        if !self.batch.is_empty() && self.mode != Some(mode) {
            self.flush(t);
            self.stats.mode_flushes += 1;
        }
        if !self.batch.fits(vertices, indices) {
            self.flush(t);
            self.stats.capacity_flushes += 1;
        }
        self.mode = Some(mode);
    }

    // ── flush ─────────────────────────────────────────────────────────────

    /// Draws whatever is staged with the variant matching its mode.
    pub fn flush(&mut self, t: &mut DrawTarget<'_>) {
        match self.mode {
            Some(BatchMode::Solid) | None => self.flush_solid(t),
            Some(BatchMode::Textured(texture)) => self.flush_textured(t, texture),
        }
    }

    /// Draws the staged geometry with per-vertex colors.
    pub fn flush_solid(&mut self, t: &mut DrawTarget<'_>) {
        let texture = t.gpu.default_texture;
        self.draw_staged(t, texture, 0.0);
    }

    /// Draws the staged geometry sampling `texture`.
    pub fn flush_textured(&mut self, t: &mut DrawTarget<'_>, texture: TextureId) {
        self.draw_staged(t, texture, 1.0);
    }

    fn draw_staged(&mut self, t: &mut DrawTarget<'_>, texture: TextureId, texture_flag: f32) {
        if self.batch.is_empty() {
            return;
        }

        let gpu = t.gpu;
        let gl = &mut *t.gl;

        gl.upload_vertices(gpu.vertex_buffer, self.batch.vertex_floats());
        gl.set_vertex_attribute(gpu.a_position, 3, Vertex::STRIDE, Vertex::POSITION_OFFSET);
        gl.set_vertex_attribute(gpu.a_color, 4, Vertex::STRIDE, Vertex::COLOR_OFFSET);
        gl.set_vertex_attribute(gpu.a_uv, 2, Vertex::STRIDE, Vertex::UV_OFFSET);
        gl.upload_indices(gpu.index_buffer, self.batch.indices());

        gl.bind_texture(texture);
        gl.set_uniform_i32(gpu.u_sampler, 0);
        gl.set_uniform_mat4(gpu.u_projection, &t.projection.to_cols_array());
        gl.set_uniform_f32(gpu.u_texture_flag, texture_flag);

        let count = self.batch.element_ptr() as u32;
        gl.draw_indexed_triangles(count);
        log::trace!("flushed {count} indices (texture flag {texture_flag})");

        self.stats.draw_calls += 1;
        self.batch.reset();
        self.mode = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::device::{Call, RecordingBackend};

    struct Rig {
        gl: RecordingBackend,
        gpu: GpuHandles,
        projection: Mat4,
        renderer: Renderer,
    }

    impl Rig {
        fn new(capacity: usize) -> Self {
            let mut gl = RecordingBackend::new();
            let gpu = GpuHandles::create(&mut gl).unwrap();
            gl.clear_calls();
            Self {
                gl,
                gpu,
                projection: Viewport::new(200.0, 200.0).ortho(),
                renderer: Renderer::new(capacity).unwrap(),
            }
        }

        fn with<R>(&mut self, f: impl FnOnce(&mut Renderer, &mut DrawTarget<'_>) -> R) -> R {
            let mut t = DrawTarget {
                gl: &mut self.gl,
                gpu: &self.gpu,
                projection: &self.projection,
            };
            f(&mut self.renderer, &mut t)
        }

        fn rect(&mut self, x: f32) {
            self.with(|r, t| r.push_rect(t, Rect::new(x, 0.0, 10.0, 10.0), ColorRgba::black()));
        }
    }

    fn positions(vertices: &[f32]) -> Vec<(f32, f32)> {
        vertices.chunks(9).map(|v| (v[0], v[1])).collect()
    }

    // ── setup ─────────────────────────────────────────────────────────────

    #[test]
    fn create_reports_compile_failure_with_log() {
        let mut gl = RecordingBackend::new().fail_compile(ShaderStage::Fragment, "line 3: oops");
        let err = GpuHandles::create(&mut gl).unwrap_err();
        assert_eq!(
            err,
            SetupError::ShaderCompile { stage: ShaderStage::Fragment, log: "line 3: oops".into() }
        );
        assert!(!gl.calls().iter().any(|c| matches!(c, Call::CreateBuffer(..))));
    }

    #[test]
    fn create_reports_link_failure() {
        let mut gl = RecordingBackend::new().fail_link("varying mismatch");
        let err = GpuHandles::create(&mut gl).unwrap_err();
        assert_eq!(err, SetupError::ProgramLink { log: "varying mismatch".into() });
    }

    #[test]
    fn create_reports_missing_names() {
        let mut gl = RecordingBackend::new().without_name(UNIFORM_TEXTURE_FLAG);
        let err = GpuHandles::create(&mut gl).unwrap_err();
        assert_eq!(err, SetupError::MissingUniform(UNIFORM_TEXTURE_FLAG));
    }

    #[test]
    fn create_uploads_opaque_default_texture() {
        let mut gl = RecordingBackend::new();
        let gpu = GpuHandles::create(&mut gl).unwrap();
        assert_eq!(gl.texture_size(gpu.default_texture), Some((1, 1)));
        assert!(gl.calls().contains(&Call::EnableAlphaBlending));
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn rects_stay_staged_until_capacity() {
        let mut rig = Rig::new(60);
        for i in 0..10 {
            rig.rect(i as f32);
        }
        assert!(rig.gl.draw_calls().is_empty());
        assert_eq!(rig.renderer.batch().element_ptr(), 60);

        rig.rect(99.0);
        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices.len(), 60);
        assert_eq!(draws[0].vertex_count(), 40);
        assert_eq!(rig.renderer.batch().element_ptr(), 6);
        assert_eq!(rig.renderer.stats().capacity_flushes, 1);
    }

    #[test]
    fn ellipse_flushes_before_it_would_overflow() {
        let mut rig = Rig::new(60);
        for i in 0..8 {
            rig.rect(i as f32);
        }
        // 20 segments need 54 indices; 12 are left.
        rig.with(|r, t| r.push_ellipse(t, Vec2::new(50.0, 50.0), 5.0, 5.0, ColorRgba::black()))
            .unwrap();
        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices.len(), 48);
        assert_eq!(rig.renderer.batch().element_ptr(), 54);
    }

    #[test]
    fn ellipse_larger_than_batch_is_rejected() {
        let mut rig = Rig::new(60);
        let err = rig
            .with(|r, t| r.push_ellipse(t, Vec2::zero(), 10.0, 10.0, ColorRgba::black()))
            .unwrap_err();
        assert_eq!(err, DrawError::PrimitiveTooLarge { needed: 114, capacity: 60 });
        assert!(rig.renderer.batch().is_empty());
    }

    #[test]
    fn huge_or_infinite_radius_is_rejected_not_overflowed() {
        let mut rig = Rig::new(600);
        for rx in [1e19, f32::INFINITY] {
            let err = rig
                .with(|r, t| r.push_ellipse(t, Vec2::zero(), rx, rx, ColorRgba::black()))
                .unwrap_err();
            assert!(matches!(err, DrawError::PrimitiveTooLarge { capacity: 600, .. }));
        }
        assert!(rig.renderer.batch().is_empty());
    }

    #[test]
    fn nan_radius_stages_nothing() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| r.push_ellipse(t, Vec2::zero(), f32::NAN, 1.0, ColorRgba::black()))
            .unwrap();
        assert!(rig.renderer.batch().is_empty());
    }

    // ── mode switching ────────────────────────────────────────────────────

    #[test]
    fn textured_after_solid_flushes_solid_batch() {
        let mut rig = Rig::new(600);
        rig.rect(0.0);
        rig.rect(20.0);
        let tex = TextureId(500);
        rig.with(|r, t| {
            r.push_textured_quad(t, tex, Vec2::new(8.0, 8.0), Rect::new(0.0, 0.0, 8.0, 8.0), Rect::new(0.0, 0.0, 8.0, 8.0))
        });

        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].indices.len(), 12);
        assert_eq!(draws[0].texture_flag, Some(0.0));
        assert_eq!(rig.renderer.mode(), Some(BatchMode::Textured(tex)));
        assert_eq!(rig.renderer.stats().mode_flushes, 1);
    }

    #[test]
    fn switching_texture_flushes_previous_texture() {
        let mut rig = Rig::new(600);
        let quad = |rig: &mut Rig, tex: TextureId| {
            rig.with(|r, t| {
                r.push_textured_quad(t, tex, Vec2::new(4.0, 4.0), Rect::new(0.0, 0.0, 4.0, 4.0), Rect::new(0.0, 0.0, 4.0, 4.0))
            })
        };
        quad(&mut rig, TextureId(500));
        quad(&mut rig, TextureId(500));
        assert!(rig.gl.draw_calls().is_empty());

        quad(&mut rig, TextureId(501));
        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].texture, Some(TextureId(500)));
        assert_eq!(draws[0].texture_flag, Some(1.0));
        assert_eq!(draws[0].indices.len(), 12);
    }

    // ── flush ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_flush_issues_nothing() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| {
            r.flush(t);
            r.flush_solid(t);
            r.flush_textured(t, TextureId(9));
        });
        assert!(rig.gl.calls().is_empty());
        assert_eq!(rig.renderer.stats().draw_calls, 0);
    }

    #[test]
    fn flush_resets_cursors_and_mode() {
        let mut rig = Rig::new(600);
        rig.rect(0.0);
        rig.with(|r, t| r.flush(t));
        let b = rig.renderer.batch();
        assert_eq!((b.vertex_ptr(), b.element_ptr()), (0, 0));
        assert_eq!(rig.renderer.mode(), None);
    }

    #[test]
    fn solid_flush_binds_default_texture_and_projection() {
        let mut rig = Rig::new(600);
        rig.rect(0.0);
        rig.with(|r, t| r.flush(t));
        let draw = &rig.gl.draw_calls()[0];
        assert_eq!(draw.texture, Some(rig.gpu.default_texture));
        assert_eq!(draw.texture_flag, Some(0.0));
        assert_eq!(draw.projection, Some(rig.projection.to_cols_array()));
    }

    #[test]
    fn flush_describes_interleaved_layout() {
        let mut rig = Rig::new(600);
        rig.rect(0.0);
        rig.with(|r, t| r.flush(t));
        let attrs: Vec<_> = rig
            .gl
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::VertexAttribute { components, stride, offset, .. } => Some((*components, *stride, *offset)),
                _ => None,
            })
            .collect();
        assert_eq!(attrs, vec![(3, 36, 0), (4, 36, 12), (2, 36, 28)]);
    }

    #[test]
    fn batches_do_not_leak_into_each_other() {
        let n = 5;
        let mut rig = Rig::new(600);
        for i in 0..n {
            rig.rect(i as f32);
        }
        rig.with(|r, t| r.flush(t));
        for i in 0..n {
            rig.rect(100.0 + i as f32);
        }
        rig.with(|r, t| r.flush(t));

        let draws = rig.gl.draw_calls();
        assert_eq!(draws.len(), 2);
        for d in &draws {
            assert_eq!(d.indices.len(), 6 * n);
            assert_eq!(d.vertex_count(), 4 * n);
        }
        assert!(positions(&draws[1].vertices).iter().all(|&(x, _)| x >= 100.0));
        assert_eq!(&draws[1].indices[..6], &[0, 1, 2, 1, 2, 3]);
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[test]
    fn rect_vertices_carry_fill_color() {
        let mut rig = Rig::new(600);
        let red = ColorRgba::new(1.0, 0.0, 0.0, 1.0);
        rig.with(|r, t| r.push_rect(t, Rect::new(1.0, 2.0, 3.0, 4.0), red));
        let v = rig.renderer.batch().vertices();
        assert_eq!(v.len(), 4);
        assert_eq!(v[0].position, [4.0, 6.0, 0.0]);
        assert_eq!(v[3].position, [1.0, 2.0, 0.0]);
        assert!(v.iter().all(|v| v.color == [1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn ellipse_radius_five_is_twenty_segment_fan() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| r.push_ellipse(t, Vec2::new(50.0, 50.0), 5.0, 5.0, ColorRgba::black()))
            .unwrap();
        let b = rig.renderer.batch();
        assert_eq!(b.vertices().len(), 20);
        assert_eq!(b.indices().len(), 54);
        assert!(b.indices().iter().all(|&i| i < 20));
        assert_eq!(&b.indices()[..9], &[0, 1, 2, 0, 2, 3, 0, 3, 4]);
        assert_eq!(&b.indices()[51..], &[0, 18, 19]);
    }

    #[test]
    fn ellipse_fan_is_anchored_at_its_own_first_vertex() {
        let mut rig = Rig::new(600);
        rig.rect(0.0);
        rig.with(|r, t| r.push_ellipse(t, Vec2::zero(), 1.0, 1.0, ColorRgba::black()))
            .unwrap();
        // 4 segments after a 4-vertex quad.
        assert_eq!(&rig.renderer.batch().indices()[6..], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn ellipse_vertices_lie_on_the_rim() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| r.push_ellipse(t, Vec2::new(10.0, 20.0), 6.0, 3.0, ColorRgba::black()))
            .unwrap();
        for v in rig.renderer.batch().vertices() {
            let dx = (v.position[0] - 10.0) / 6.0;
            let dy = (v.position[1] - 20.0) / 3.0;
            assert!((dx * dx + dy * dy - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn tiny_ellipse_stages_nothing() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| r.push_ellipse(t, Vec2::zero(), 0.5, 0.5, ColorRgba::black()))
            .unwrap();
        assert!(rig.renderer.batch().is_empty());
        assert_eq!(rig.renderer.mode(), None);
    }

    #[test]
    fn line_is_offset_by_half_weight() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| {
            r.push_line(t, Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), 4.0, ColorRgba::black())
        });
        let pos: Vec<_> = rig.renderer.batch().vertices().iter().map(|v| (v.position[0], v.position[1])).collect();
        assert_eq!(pos, vec![(0.0, -2.0), (10.0, -2.0), (0.0, 2.0), (10.0, 2.0)]);
    }

    #[test]
    fn zero_length_line_stages_nothing() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| r.push_line(t, Vec2::new(3.0, 3.0), Vec2::new(3.0, 3.0), 4.0, ColorRgba::black()));
        assert!(rig.renderer.batch().is_empty());
    }

    #[test]
    fn textured_quad_uvs_are_sub_rect_fractions() {
        let mut rig = Rig::new(600);
        rig.with(|r, t| {
            r.push_textured_quad(
                t,
                TextureId(7),
                Vec2::new(64.0, 32.0),
                Rect::new(16.0, 8.0, 32.0, 16.0),
                Rect::new(100.0, 100.0, 32.0, 16.0),
            )
        });
        let v = rig.renderer.batch().vertices();
        assert_eq!(v[0].uv, [0.75, 0.75]);
        assert_eq!(v[3].uv, [0.25, 0.25]);
        assert_eq!(v[0].position, [132.0, 116.0, 0.0]);
        assert!(v.iter().all(|v| v.color == [0.0; 4]));
    }
}
