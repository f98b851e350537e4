use std::collections::HashMap;

use crate::coords::ColorRgba;
use crate::render::shaders::{UNIFORM_PROJECTION, UNIFORM_TEXTURE_FLAG};

use super::backend::{
    AttribLocation, BufferId, BufferKind, GraphicsBackend, ProgramId, ShaderId, ShaderStage,
    TextureFilter, TextureId, UniformLocation,
};

/// One call made against a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateBuffer(BufferId, BufferKind),
    UploadVertices { buffer: BufferId, data: Vec<f32> },
    UploadIndices { buffer: BufferId, data: Vec<u16> },
    DeleteBuffer(BufferId),
    CompileShader(ShaderStage),
    LinkProgram(ProgramId),
    DeleteShader(ShaderId),
    UseProgram(ProgramId),
    VertexAttribute { location: AttribLocation, components: u32, stride: u32, offset: u32 },
    UniformMat4 { location: UniformLocation, value: [f32; 16] },
    UniformF32 { location: UniformLocation, value: f32 },
    UniformI32 { location: UniformLocation, value: i32 },
    CreateTexture(TextureId),
    UploadTexture { texture: TextureId, width: u32, height: u32 },
    TextureFilter { texture: TextureId, min: TextureFilter, mag: TextureFilter },
    GenerateMipmaps(TextureId),
    BindTexture(TextureId),
    DeleteTexture(TextureId),
    EnableAlphaBlending,
    Viewport { width: u32, height: u32 },
    ClearColor(ColorRgba),
    Clear,
    DrawIndexed { count: u32 },
    ReadPixels { x: u32, y: u32, width: u32, height: u32 },
    Present,
}

/// Snapshot of the state a draw call was issued with.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Contents of the last vertex upload, 9 floats per vertex.
    pub vertices: Vec<f32>,
    /// Indices consumed by the draw (a prefix of the last index upload).
    pub indices: Vec<u16>,
    pub texture: Option<TextureId>,
    pub texture_flag: Option<f32>,
    pub projection: Option<[f32; 16]>,
}

impl DrawCall {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 9
    }
}

/// Headless backend that records every call.
///
/// Used by tests and by tools that need the renderer's output without a GPU.
/// Handles are allocated from one counter, so they are unique across kinds.
/// Attribute and uniform lookups succeed for every name unless
/// [`without_name`](Self::without_name) hides it.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<Call>,
    next_id: u32,
    names: HashMap<String, u32>,
    hidden: Vec<String>,
    compile_failure: Option<(ShaderStage, String)>,
    link_failure: Option<String>,
    textures: HashMap<TextureId, (u32, u32)>,
    clear_color: ColorRgba,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes compilation of `stage` fail with `log`.
    pub fn fail_compile(mut self, stage: ShaderStage, log: impl Into<String>) -> Self {
        self.compile_failure = Some((stage, log.into()));
        self
    }

    /// Makes every link fail with `log`.
    pub fn fail_link(mut self, log: impl Into<String>) -> Self {
        self.link_failure = Some(log.into());
        self
    }

    /// Makes attribute/uniform lookups of `name` return `None`.
    pub fn without_name(mut self, name: impl Into<String>) -> Self {
        self.hidden.push(name.into());
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Size of a live texture, if it has been uploaded and not deleted.
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }

    /// Replays the recorded calls and returns one entry per draw.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        let flag_loc = self.names.get(UNIFORM_TEXTURE_FLAG).map(|&n| UniformLocation(n));
        let proj_loc = self.names.get(UNIFORM_PROJECTION).map(|&n| UniformLocation(n));

        let mut vertices: &[f32] = &[];
        let mut indices: &[u16] = &[];
        let mut texture = None;
        let mut texture_flag = None;
        let mut projection = None;
        let mut out = Vec::new();

        for call in &self.calls {
            match call {
                Call::UploadVertices { data, .. } => vertices = data,
                Call::UploadIndices { data, .. } => indices = data,
                Call::BindTexture(t) => texture = Some(*t),
                Call::UniformF32 { location, value } if Some(*location) == flag_loc => {
                    texture_flag = Some(*value);
                }
                Call::UniformMat4 { location, value } if Some(*location) == proj_loc => {
                    projection = Some(*value);
                }
                Call::DrawIndexed { count } => {
                    let n = (*count as usize).min(indices.len());
                    out.push(DrawCall {
                        vertices: vertices.to_vec(),
                        indices: indices[..n].to_vec(),
                        texture,
                        texture_flag,
                        projection,
                    });
                }
                _ => {}
            }
        }
        out
    }

    fn alloc(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn lookup(&mut self, name: &str) -> Option<u32> {
        if self.hidden.iter().any(|h| h == name) {
            return None;
        }
        if let Some(&id) = self.names.get(name) {
            return Some(id);
        }
        let id = self.alloc();
        self.names.insert(name.to_string(), id);
        Some(id)
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_buffer(&mut self, kind: BufferKind) -> BufferId {
        let id = BufferId(self.alloc());
        self.calls.push(Call::CreateBuffer(id, kind));
        id
    }

    fn upload_vertices(&mut self, buffer: BufferId, data: &[f32]) {
        self.calls.push(Call::UploadVertices { buffer, data: data.to_vec() });
    }

    fn upload_indices(&mut self, buffer: BufferId, data: &[u16]) {
        self.calls.push(Call::UploadIndices { buffer, data: data.to_vec() });
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.calls.push(Call::DeleteBuffer(buffer));
    }

    fn compile_shader(&mut self, stage: ShaderStage, _source: &str) -> Result<ShaderId, String> {
        self.calls.push(Call::CompileShader(stage));
        if let Some((failing, log)) = &self.compile_failure {
            if *failing == stage {
                return Err(log.clone());
            }
        }
        Ok(ShaderId(self.alloc()))
    }

    fn link_program(&mut self, _vertex: ShaderId, _fragment: ShaderId) -> Result<ProgramId, String> {
        if let Some(log) = &self.link_failure {
            return Err(log.clone());
        }
        let id = ProgramId(self.alloc());
        self.calls.push(Call::LinkProgram(id));
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.calls.push(Call::DeleteShader(shader));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.calls.push(Call::UseProgram(program));
    }

    fn attrib_location(&mut self, _program: ProgramId, name: &str) -> Option<AttribLocation> {
        self.lookup(name).map(AttribLocation)
    }

    fn uniform_location(&mut self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.lookup(name).map(UniformLocation)
    }

    fn set_vertex_attribute(&mut self, location: AttribLocation, components: u32, stride: u32, offset: u32) {
        self.calls.push(Call::VertexAttribute { location, components, stride, offset });
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &[f32; 16]) {
        self.calls.push(Call::UniformMat4 { location, value: *value });
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        self.calls.push(Call::UniformF32 { location, value });
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        self.calls.push(Call::UniformI32 { location, value });
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.alloc());
        self.calls.push(Call::CreateTexture(id));
        id
    }

    fn upload_texture_rgba(&mut self, texture: TextureId, width: u32, height: u32, pixels: &[u8]) {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        self.textures.insert(texture, (width, height));
        self.calls.push(Call::UploadTexture { texture, width, height });
    }

    fn set_texture_filter(&mut self, texture: TextureId, min: TextureFilter, mag: TextureFilter) {
        self.calls.push(Call::TextureFilter { texture, min, mag });
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        self.calls.push(Call::GenerateMipmaps(texture));
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.calls.push(Call::BindTexture(texture));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.calls.push(Call::DeleteTexture(texture));
    }

    fn enable_alpha_blending(&mut self) {
        self.calls.push(Call::EnableAlphaBlending);
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Viewport { width, height });
    }

    fn set_clear_color(&mut self, color: ColorRgba) {
        self.clear_color = color;
        self.calls.push(Call::ClearColor(color));
    }

    fn clear(&mut self) {
        self.calls.push(Call::Clear);
    }

    fn draw_indexed_triangles(&mut self, index_count: u32) {
        self.calls.push(Call::DrawIndexed { count: index_count });
    }

    /// Returns the region filled with the current clear color.
    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        self.calls.push(Call::ReadPixels { x, y, width, height });
        let c = self.clear_color;
        let px = [c.r, c.g, c.b, c.a].map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8);
        px.repeat((width * height) as usize)
    }

    fn present(&mut self) {
        self.calls.push(Call::Present);
    }
}
