use crate::coords::ColorRgba;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

handle!(
    /// GPU buffer object.
    BufferId
);
handle!(
    /// Compiled shader stage, valid until [`GraphicsBackend::delete_shader`].
    ShaderId
);
handle!(
    /// Linked vertex + fragment program.
    ProgramId
);
handle!(
    /// 2D RGBA texture.
    TextureId
);
handle!(AttribLocation);
handle!(UniformLocation);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
    /// Linear within a level, nearest between mip levels.
    LinearMipmapNearest,
}

/// Graphics capabilities the renderer is built on.
///
/// The shape follows a classic immediate-mode GL context: one bound program,
/// one bound texture, and buffers that are re-uploaded wholesale before each
/// draw. Implementations are single-threaded and owned by the frame loop.
///
/// Calls with stale or foreign handles are implementation-defined; the
/// renderer only passes handles it created through the same backend.
pub trait GraphicsBackend {
    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self, kind: BufferKind) -> BufferId;

    /// Replaces the contents of a vertex buffer.
    fn upload_vertices(&mut self, buffer: BufferId, data: &[f32]);

    /// Replaces the contents of an index buffer.
    fn upload_indices(&mut self, buffer: BufferId, data: &[u16]);

    fn delete_buffer(&mut self, buffer: BufferId);

    // ── shaders ───────────────────────────────────────────────────────────

    /// Compiles one stage. `Err` carries the compiler's diagnostic log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;

    /// Links two compiled stages. `Err` carries the linker's diagnostic log.
    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String>;

    fn delete_shader(&mut self, shader: ShaderId);

    fn use_program(&mut self, program: ProgramId);

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation>;

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Describes a float attribute inside the bound vertex buffer. Stride and
    /// offset are in bytes.
    fn set_vertex_attribute(&mut self, location: AttribLocation, components: u32, stride: u32, offset: u32);

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &[f32; 16]);

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32);

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32);

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&mut self) -> TextureId;

    /// Uploads tightly packed RGBA8 pixels, `width * height * 4` bytes.
    fn upload_texture_rgba(&mut self, texture: TextureId, width: u32, height: u32, pixels: &[u8]);

    fn set_texture_filter(&mut self, texture: TextureId, min: TextureFilter, mag: TextureFilter);

    fn generate_mipmaps(&mut self, texture: TextureId);

    fn bind_texture(&mut self, texture: TextureId);

    fn delete_texture(&mut self, texture: TextureId);

    // ── target state ──────────────────────────────────────────────────────

    /// Enables `SRC_ALPHA, ONE_MINUS_SRC_ALPHA` blending.
    fn enable_alpha_blending(&mut self);

    /// Sets the drawing viewport in canvas pixels.
    fn set_viewport(&mut self, width: u32, height: u32);

    fn set_clear_color(&mut self, color: ColorRgba);

    fn clear(&mut self);

    /// Draws `index_count` indices from the bound index buffer as a triangle list.
    fn draw_indexed_triangles(&mut self, index_count: u32);

    /// Reads back a region of the canvas as RGBA8, top-left origin.
    ///
    /// Always returns `width * height * 4` bytes.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8>;

    /// Makes everything drawn this tick visible. Called once at the end of a tick.
    fn present(&mut self) {}
}
