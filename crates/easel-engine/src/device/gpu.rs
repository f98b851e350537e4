use std::collections::{BTreeMap, HashMap};
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use wgpu::SurfaceError;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::coords::ColorRgba;

use super::backend::{
    AttribLocation, BufferId, BufferKind, GraphicsBackend, ProgramId, ShaderId, ShaderStage, TextureFilter,
    TextureId, UniformLocation,
};

const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const MIN_BUFFER_SIZE: u64 = 256;
const UNIFORM_GROUP: u32 = 0;
const TEXTURE_GROUP: u32 = 1;
/// Bindings per group when packing `(group, binding)` into a uniform location.
const BINDINGS_PER_GROUP: u32 = 16;

/// Initialization parameters for the GPU layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick an sRGB surface format when one is offered.
    ///
    /// Off by default: canvas colors are stored as written, so a plain UNORM
    /// surface shows them unchanged.
    pub prefer_srgb: bool,

    pub present_mode: wgpu::PresentMode,

    /// Used when the surface supports it, otherwise the first supported mode.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Hint only; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

struct Canvas {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuBuffer {
    kind: BufferKind,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    /// Bytes written by the last upload.
    len: u64,
}

struct CompiledShader {
    stage: ShaderStage,
    source: String,
    entry_point: String,
    module: naga::Module,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum ResourceKind {
    Buffer { size: u64 },
    Texture,
    Sampler,
}

#[derive(Debug, Copy, Clone)]
struct Resource {
    group: u32,
    binding: u32,
    kind: ResourceKind,
}

impl Resource {
    fn location(&self) -> u32 {
        self.group * BINDINGS_PER_GROUP + self.binding
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
struct AttributeLayout {
    location: u32,
    components: u32,
    stride: u32,
    offset: u32,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct PipelineKey {
    attributes: Vec<AttributeLayout>,
    blending: bool,
}

struct Program {
    vertex: wgpu::ShaderModule,
    vertex_entry: String,
    fragment: wgpu::ShaderModule,
    fragment_entry: String,
    attributes: HashMap<String, u32>,
    resources: HashMap<String, Resource>,
    uniform_buffers: HashMap<u32, wgpu::Buffer>,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    texture_binding: u32,
    sampler_binding: u32,
    layout: wgpu::PipelineLayout,
    pipeline: Option<(PipelineKey, wgpu::RenderPipeline)>,
}

struct GpuTexture {
    texture: Option<(wgpu::Texture, wgpu::TextureView)>,
    /// CPU copy of level 0, kept for mipmap generation.
    pixels: Option<RgbaImage>,
    min: TextureFilter,
    mag: TextureFilter,
}

struct Presenter {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

/// [`GraphicsBackend`] on wgpu, drawing into an offscreen canvas that is
/// copied onto the window surface by [`present`](GraphicsBackend::present).
///
/// Shaders are WGSL, compiled and reflected with naga so attribute and
/// uniform names resolve the way a GL program's do. Uniforms live in group 0
/// (one buffer per binding) and the sampled texture in group 1. Every clear
/// and every draw is its own submission, so uniform and buffer writes made
/// between draws apply in call order.
///
/// Coordinates handed in by the renderer are logical pixels; the canvas is
/// sized in physical pixels and viewport/readback are scaled accordingly.
pub struct WgpuBackend {
    _window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    scale_factor: f64,

    canvas: Canvas,
    presenter: Presenter,
    clear_color: wgpu::Color,
    viewport: (u32, u32),
    blending: bool,

    next_id: u32,
    buffers: HashMap<u32, GpuBuffer>,
    shaders: HashMap<u32, CompiledShader>,
    programs: HashMap<u32, Program>,
    textures: HashMap<u32, GpuTexture>,
    samplers: HashMap<(TextureFilter, TextureFilter), wgpu::Sampler>,

    current_program: Option<u32>,
    bound_texture: Option<u32>,
    vertex_buffer: Option<u32>,
    index_buffer: Option<u32>,
    attributes: BTreeMap<u32, AttributeLayout>,
}

impl WgpuBackend {
    /// Creates the device and surface for `window` and an offscreen canvas of
    /// the window's size.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("easel device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&caps, init.prefer_srgb).context("no supported surface formats")?;
        let alpha_mode = init
            .alpha_mode
            .filter(|m| caps.alpha_modes.contains(m))
            .unwrap_or_else(|| caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto));

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: init.desired_maximum_frame_latency,
        };
        surface.configure(&device, &config);

        let canvas = create_canvas(&device, size.width, size.height);
        let presenter = create_presenter(&device, format, &canvas.view);
        let scale_factor = window.scale_factor();

        log::info!(
            "gpu ready: {}x{} surface, format {format:?}, scale factor {scale_factor}",
            size.width,
            size.height
        );

        let mut backend = Self {
            _window: window,
            surface,
            device,
            queue,
            config,
            size,
            scale_factor,
            canvas,
            presenter,
            clear_color: wgpu::Color::BLACK,
            viewport: (size.width, size.height),
            blending: false,
            next_id: 0,
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            current_program: None,
            bound_texture: None,
            vertex_buffer: None,
            index_buffer: None,
            attributes: BTreeMap::new(),
        };
        backend.clear();
        Ok(backend)
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    /// Reconfigures the surface and grows or shrinks the canvas, keeping the
    /// overlapping region of what was drawn.
    ///
    /// A 0x0 size (minimized window) is recorded and otherwise ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        let old = std::mem::replace(&mut self.canvas, create_canvas(&self.device, new_size.width, new_size.height));
        self.clear();

        let mut encoder = self.encoder("easel canvas carry-over");
        encoder.copy_texture_to_texture(
            copy_info(&old.texture, 0, 0, 0),
            copy_info(&self.canvas.texture, 0, 0, 0),
            wgpu::Extent3d {
                width: old.width.min(new_size.width),
                height: old.height.min(new_size.height),
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        self.presenter.bind_group =
            present_bind_group(&self.device, &self.presenter.layout, &self.canvas.view, &self.presenter.sampler);
    }

    /// Converts a `SurfaceError` into a higher-level action.
    pub fn handle_surface_error(&mut self, err: SurfaceError) -> SurfaceErrorAction {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => {
                if self.size.width > 0 && self.size.height > 0 {
                    self.surface.configure(&self.device, &self.config);
                }
                SurfaceErrorAction::Reconfigured
            }
            SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            SurfaceError::Timeout => SurfaceErrorAction::SkipFrame,
            SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn physical(&self, logical: u32) -> u32 {
        (logical as f64 * self.scale_factor).round() as u32
    }

    fn sampler(&mut self, min: TextureFilter, mag: TextureFilter) -> &wgpu::Sampler {
        let device = &self.device;
        self.samplers.entry((min, mag)).or_insert_with(|| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("easel sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter_mode(mag),
                min_filter: filter_mode(min),
                mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                ..Default::default()
            })
        })
    }

    fn ensure_pipeline(&mut self, program: u32) -> Option<()> {
        let key = PipelineKey {
            attributes: self.attributes.values().copied().collect(),
            blending: self.blending,
        };
        let device = &self.device;
        let p = self.programs.get_mut(&program)?;
        if p.pipeline.as_ref().is_some_and(|(k, _)| *k == key) {
            return Some(());
        }

        let stride = key.attributes.first().map_or(0, |a| a.stride);
        let attributes: Vec<wgpu::VertexAttribute> = key
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: vertex_format(a.components),
                offset: a.offset as u64,
                shader_location: a.location,
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("easel batch pipeline"),
            layout: Some(&p.layout),
            vertex: wgpu::VertexState {
                module: &p.vertex,
                entry_point: Some(p.vertex_entry.as_str()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: stride as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &p.fragment,
                entry_point: Some(p.fragment_entry.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: CANVAS_FORMAT,
                    blend: key.blending.then_some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("built pipeline for program {program} ({} attributes)", key.attributes.len());
        p.pipeline = Some((key, pipeline));
        Some(())
    }

    fn write_uniform(&mut self, location: UniformLocation, bytes: &[u8]) {
        let Some(program) = self.current_program.and_then(|id| self.programs.get(&id)) else {
            log::warn!("uniform {} set with no program in use", location.0);
            return;
        };
        match program.uniform_buffers.get(&location.0) {
            Some(buffer) if bytes.len() as u64 <= buffer.size() => self.queue.write_buffer(buffer, 0, bytes),
            Some(_) => log::warn!("uniform {} is smaller than {} bytes", location.0, bytes.len()),
            None => log::warn!("uniform {} is not a buffer binding", location.0),
        }
    }

    fn write_buffer(&mut self, id: BufferId, bytes: &[u8]) {
        let device = &self.device;
        let Some(b) = self.buffers.get_mut(&id.0) else {
            log::warn!("upload to unknown buffer {}", id.0);
            return;
        };

        let len = bytes.len() as u64;
        if b.buffer.is_none() || len > b.capacity {
            let capacity = len.next_power_of_two().max(MIN_BUFFER_SIZE);
            let usage = match b.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            };
            b.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("easel batch buffer"),
                size: capacity,
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            b.capacity = capacity;
        }

        if let Some(buffer) = &b.buffer {
            if len > 0 {
                self.queue.write_buffer(buffer, 0, bytes);
            }
        }
        b.len = len;
    }

    fn canvas_pass<'e>(&'e self, encoder: &'e mut wgpu::CommandEncoder, load: wgpu::LoadOp<wgpu::Color>) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("easel canvas pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.canvas.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }

    /// Reads a physical-pixel region of the canvas. The region must lie
    /// inside the canvas and be non-empty.
    fn read_canvas(&self, x: u32, y: u32, width: u32, height: u32) -> Option<Vec<u8>> {
        let unpadded = width * 4;
        let padded = (unpadded + wgpu::COPY_BYTES_PER_ROW_ALIGNMENT - 1) & !(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT - 1);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("easel readback"),
            size: padded as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("easel readback");
        encoder.copy_texture_to_buffer(
            copy_info(&self.canvas.texture, 0, x, y),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        let index = self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });

        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(index),
            timeout: None,
        }) {
            log::error!("readback poll failed: {e}");
            return None;
        }
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::error!("readback map failed: {e}");
                return None;
            }
            Err(_) => {
                log::error!("readback map callback never ran");
                return None;
            }
        }

        let mut out = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                out.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();
        Some(out)
    }

    fn upload_level(&self, texture: &wgpu::Texture, level: u32, img: &RgbaImage) {
        self.queue.write_texture(
            copy_info(texture, level, 0, 0),
            img.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(img.width() * 4),
                rows_per_image: Some(img.height()),
            },
            wgpu::Extent3d {
                width: img.width(),
                height: img.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampled_texture(&self, width: u32, height: u32, levels: u32) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("easel texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CANVAS_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

impl GraphicsBackend for WgpuBackend {
    fn create_buffer(&mut self, kind: BufferKind) -> BufferId {
        let id = self.alloc_id();
        self.buffers.insert(id, GpuBuffer { kind, buffer: None, capacity: 0, len: 0 });
        BufferId(id)
    }

    fn upload_vertices(&mut self, buffer: BufferId, data: &[f32]) {
        self.write_buffer(buffer, bytemuck::cast_slice(data));
        self.vertex_buffer = Some(buffer.0);
    }

    fn upload_indices(&mut self, buffer: BufferId, data: &[u16]) {
        // Copies must be a multiple of 4 bytes.
        if data.len() % 2 == 1 {
            let mut padded = data.to_vec();
            padded.push(0);
            self.write_buffer(buffer, bytemuck::cast_slice(&padded));
        } else {
            self.write_buffer(buffer, bytemuck::cast_slice(data));
        }
        self.index_buffer = Some(buffer.0);
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer.0);
        if self.vertex_buffer == Some(buffer.0) {
            self.vertex_buffer = None;
        }
        if self.index_buffer == Some(buffer.0) {
            self.index_buffer = None;
        }
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
            .validate(&module)
            .map_err(|e| e.emit_to_string(source))?;

        let wanted = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        };
        let entry_point = module
            .entry_points
            .iter()
            .find(|ep| ep.stage == wanted)
            .map(|ep| ep.name.clone())
            .ok_or_else(|| format!("no {stage} entry point"))?;

        let id = self.alloc_id();
        self.shaders.insert(
            id,
            CompiledShader {
                stage,
                source: source.to_owned(),
                entry_point,
                module,
            },
        );
        Ok(ShaderId(id))
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let vs = self.shaders.get(&vertex.0).ok_or("unknown vertex shader")?;
        let fs = self.shaders.get(&fragment.0).ok_or("unknown fragment shader")?;
        if vs.stage != ShaderStage::Vertex || fs.stage != ShaderStage::Fragment {
            return Err("expected one vertex and one fragment shader".to_string());
        }

        let attributes = reflect_attributes(vs);
        let resources = merge_resources(reflect_resources(&vs.module)?, reflect_resources(&fs.module)?)?;

        let mut uniform_entries = Vec::new();
        let mut texture_binding = None;
        let mut sampler_binding = None;
        for (name, r) in &resources {
            match (r.group, r.kind) {
                (UNIFORM_GROUP, ResourceKind::Buffer { size }) => uniform_entries.push((r.binding, size)),
                (TEXTURE_GROUP, ResourceKind::Texture) => texture_binding = Some(r.binding),
                (TEXTURE_GROUP, ResourceKind::Sampler) => sampler_binding = Some(r.binding),
                _ => return Err(format!("`{name}` at group {} binding {} is not supported", r.group, r.binding)),
            }
        }
        let (Some(texture_binding), Some(sampler_binding)) = (texture_binding, sampler_binding) else {
            return Err(format!("program needs a texture and a sampler in group {TEXTURE_GROUP}"));
        };
        uniform_entries.sort_unstable();

        let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let uniform_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("easel uniform bgl"),
            entries: &uniform_entries
                .iter()
                .map(|&(binding, size)| wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size),
                    },
                    count: None,
                })
                .collect::<Vec<_>>(),
        });
        let texture_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("easel texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: texture_binding,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: sampler_binding,
                    visibility,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_buffers: HashMap<u32, wgpu::Buffer> = uniform_entries
            .iter()
            .map(|&(binding, size)| {
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("easel uniform"),
                    size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (UNIFORM_GROUP * BINDINGS_PER_GROUP + binding, buffer)
            })
            .collect();

        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("easel uniform bind group"),
            layout: &uniform_layout,
            entries: &uniform_entries
                .iter()
                .filter_map(|&(binding, _)| {
                    let buffer = uniform_buffers.get(&(UNIFORM_GROUP * BINDINGS_PER_GROUP + binding))?;
                    Some(wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() })
                })
                .collect::<Vec<_>>(),
        });

        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("easel batch pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let module = |s: &CompiledShader| {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("easel shader"),
                source: wgpu::ShaderSource::Wgsl(s.source.as_str().into()),
            })
        };

        let program = Program {
            vertex: module(vs),
            vertex_entry: vs.entry_point.clone(),
            fragment: module(fs),
            fragment_entry: fs.entry_point.clone(),
            attributes,
            resources,
            uniform_buffers,
            uniform_bind_group,
            texture_layout,
            texture_binding,
            sampler_binding,
            layout,
            pipeline: None,
        };

        let id = self.alloc_id();
        self.programs.insert(id, program);
        log::debug!("linked program {id}");
        Ok(ProgramId(id))
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader.0);
    }

    fn use_program(&mut self, program: ProgramId) {
        if self.programs.contains_key(&program.0) {
            self.current_program = Some(program.0);
        } else {
            log::warn!("use of unknown program {}", program.0);
        }
    }

    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        self.programs.get(&program.0)?.attributes.get(name).copied().map(AttribLocation)
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let r = self.programs.get(&program.0)?.resources.get(name)?;
        Some(UniformLocation(r.location()))
    }

    fn set_vertex_attribute(&mut self, location: AttribLocation, components: u32, stride: u32, offset: u32) {
        self.attributes.insert(
            location.0,
            AttributeLayout { location: location.0, components, stride, offset },
        );
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &[f32; 16]) {
        self.write_uniform(location, bytemuck::cast_slice(value));
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        // Scalars travel in the first lane of a vec4.
        self.write_uniform(location, bytemuck::cast_slice(&[value, 0.0, 0.0, 0.0]));
    }

    fn set_uniform_i32(&mut self, location: UniformLocation, value: i32) {
        // Only texture unit 0 exists; sampler uniforms need no write.
        if location.0 / BINDINGS_PER_GROUP == TEXTURE_GROUP {
            if value != 0 {
                log::warn!("texture unit {value} requested; only unit 0 is available");
            }
            return;
        }
        self.write_uniform(location, bytemuck::cast_slice(&[value, 0, 0, 0]));
    }

    fn create_texture(&mut self) -> TextureId {
        let id = self.alloc_id();
        self.textures.insert(
            id,
            GpuTexture {
                texture: None,
                pixels: None,
                min: TextureFilter::Linear,
                mag: TextureFilter::Linear,
            },
        );
        TextureId(id)
    }

    fn upload_texture_rgba(&mut self, texture: TextureId, width: u32, height: u32, pixels: &[u8]) {
        let Some(img) = RgbaImage::from_raw(width, height, pixels.to_vec()) else {
            log::error!("texture {}: {} bytes do not fill {width}x{height}", texture.0, pixels.len());
            return;
        };
        if width == 0 || height == 0 {
            log::warn!("texture {}: empty upload ignored", texture.0);
            return;
        }

        let (gpu_texture, view) = self.create_sampled_texture(width, height, 1);
        self.upload_level(&gpu_texture, 0, &img);

        if let Some(t) = self.textures.get_mut(&texture.0) {
            t.texture = Some((gpu_texture, view));
            t.pixels = Some(img);
        } else {
            log::warn!("upload to unknown texture {}", texture.0);
        }
    }

    fn set_texture_filter(&mut self, texture: TextureId, min: TextureFilter, mag: TextureFilter) {
        if let Some(t) = self.textures.get_mut(&texture.0) {
            t.min = min;
            t.mag = mag;
        }
    }

    fn generate_mipmaps(&mut self, texture: TextureId) {
        let Some(base) = self.textures.get(&texture.0).and_then(|t| t.pixels.clone()) else {
            log::warn!("mipmaps requested for texture {} with no pixels", texture.0);
            return;
        };

        let levels = 32 - base.width().max(base.height()).leading_zeros();
        let (gpu_texture, view) = self.create_sampled_texture(base.width(), base.height(), levels);
        self.upload_level(&gpu_texture, 0, &base);
        for level in 1..levels {
            let w = (base.width() >> level).max(1);
            let h = (base.height() >> level).max(1);
            let scaled = imageops::resize(&base, w, h, FilterType::Triangle);
            self.upload_level(&gpu_texture, level, &scaled);
        }

        if let Some(t) = self.textures.get_mut(&texture.0) {
            t.texture = Some((gpu_texture, view));
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.bound_texture = Some(texture.0);
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture.0);
        if self.bound_texture == Some(texture.0) {
            self.bound_texture = None;
        }
    }

    fn enable_alpha_blending(&mut self) {
        self.blending = true;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn set_clear_color(&mut self, color: ColorRgba) {
        self.clear_color = wgpu::Color {
            r: color.r as f64,
            g: color.g as f64,
            b: color.b as f64,
            a: color.a as f64,
        };
    }

    fn clear(&mut self) {
        let mut encoder = self.encoder("easel clear");
        drop(self.canvas_pass(&mut encoder, wgpu::LoadOp::Clear(self.clear_color)));
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_indexed_triangles(&mut self, index_count: u32) {
        if index_count == 0 {
            return;
        }
        let Some(program_id) = self.current_program else {
            log::warn!("draw with no program in use");
            return;
        };
        if self.ensure_pipeline(program_id).is_none() {
            return;
        }

        let Some((min, mag)) = self
            .bound_texture
            .and_then(|id| self.textures.get(&id))
            .filter(|t| t.texture.is_some())
            .map(|t| (t.min, t.mag))
        else {
            log::warn!("draw with no uploaded texture bound");
            return;
        };
        self.sampler(min, mag);

        let (Some(program), Some(texture), Some(sampler)) = (
            self.programs.get(&program_id),
            self.bound_texture.and_then(|id| self.textures.get(&id)).and_then(|t| t.texture.as_ref()),
            self.samplers.get(&(min, mag)),
        ) else {
            return;
        };
        let (Some(vertices), Some(indices)) = (
            self.vertex_buffer.and_then(|id| self.buffers.get(&id)),
            self.index_buffer.and_then(|id| self.buffers.get(&id)),
        ) else {
            log::warn!("draw with no vertex or index data");
            return;
        };
        let (Some(vbo), Some(ibo)) = (vertices.buffer.as_ref(), indices.buffer.as_ref()) else {
            return;
        };
        let Some((_, pipeline)) = program.pipeline.as_ref() else {
            return;
        };

        let texture_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("easel texture bind group"),
            layout: &program.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: program.texture_binding,
                    resource: wgpu::BindingResource::TextureView(&texture.1),
                },
                wgpu::BindGroupEntry {
                    binding: program.sampler_binding,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        let vw = self.physical(self.viewport.0).clamp(1, self.canvas.width);
        let vh = self.physical(self.viewport.1).clamp(1, self.canvas.height);

        let mut encoder = self.encoder("easel draw");
        {
            let mut rpass = self.canvas_pass(&mut encoder, wgpu::LoadOp::Load);
            rpass.set_viewport(0.0, 0.0, vw as f32, vh as f32, 0.0, 1.0);
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(UNIFORM_GROUP, &program.uniform_bind_group, &[]);
            rpass.set_bind_group(TEXTURE_GROUP, &texture_bind_group, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..vertices.len));
            rpass.set_index_buffer(ibo.slice(..indices.len), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_pixels(&mut self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let expected = (width * height * 4) as usize;
        let px = self.physical(x).min(self.canvas.width);
        let py = self.physical(y).min(self.canvas.height);
        let pw = self.physical(width).min(self.canvas.width - px);
        let ph = self.physical(height).min(self.canvas.height - py);
        if pw == 0 || ph == 0 {
            return vec![0; expected];
        }

        let Some(raw) = self.read_canvas(px, py, pw, ph) else {
            return vec![0; expected];
        };
        if (pw, ph) == (width, height) {
            return raw;
        }

        match RgbaImage::from_raw(pw, ph, raw) {
            Some(img) => imageops::resize(&img, width, height, FilterType::Triangle).into_raw(),
            None => vec![0; expected],
        }
    }

    fn present(&mut self) {
        if self.size.width == 0 || self.size.height == 0 {
            return;
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => {
                let action = self.handle_surface_error(err);
                if action == SurfaceErrorAction::Fatal {
                    log::error!("surface lost for good; frame dropped");
                } else {
                    log::debug!("surface error handled: {action:?}");
                }
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.encoder("easel present");
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("easel present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.presenter.pipeline);
            rpass.set_bind_group(0, &self.presenter.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}

fn reflect_attributes(shader: &CompiledShader) -> HashMap<String, u32> {
    let Some(ep) = shader.module.entry_points.iter().find(|ep| ep.name == shader.entry_point) else {
        return HashMap::new();
    };
    ep.function
        .arguments
        .iter()
        .filter_map(|arg| match (&arg.name, &arg.binding) {
            (Some(name), Some(naga::Binding::Location { location, .. })) => Some((name.clone(), *location)),
            _ => None,
        })
        .collect()
}

fn reflect_resources(module: &naga::Module) -> Result<HashMap<String, Resource>, String> {
    let mut out = HashMap::new();
    for (_, var) in module.global_variables.iter() {
        let (Some(name), Some(binding)) = (&var.name, &var.binding) else {
            continue;
        };
        let kind = match (var.space, &module.types[var.ty].inner) {
            (naga::AddressSpace::Uniform, naga::TypeInner::Matrix { .. }) => ResourceKind::Buffer { size: 64 },
            (naga::AddressSpace::Uniform, _) => ResourceKind::Buffer { size: 16 },
            (naga::AddressSpace::Handle, naga::TypeInner::Image { .. }) => ResourceKind::Texture,
            (naga::AddressSpace::Handle, naga::TypeInner::Sampler { .. }) => ResourceKind::Sampler,
            _ => return Err(format!("`{name}`: unsupported resource type")),
        };
        if binding.binding >= BINDINGS_PER_GROUP {
            return Err(format!("`{name}`: binding {} is out of range", binding.binding));
        }
        out.insert(name.clone(), Resource { group: binding.group, binding: binding.binding, kind });
    }
    Ok(out)
}

fn merge_resources(
    mut vertex: HashMap<String, Resource>,
    fragment: HashMap<String, Resource>,
) -> Result<HashMap<String, Resource>, String> {
    for (name, r) in fragment {
        if let Some(existing) = vertex.get(&name) {
            if existing.location() != r.location() || existing.kind != r.kind {
                return Err(format!("`{name}` is declared differently in the two stages"));
            }
        } else if let Some((other, _)) = vertex.iter().find(|(_, v)| v.location() == r.location()) {
            return Err(format!("`{name}` and `{other}` share group {} binding {}", r.group, r.binding));
        }
        vertex.insert(name, r);
    }
    Ok(vertex)
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn filter_mode(filter: TextureFilter) -> wgpu::FilterMode {
    match filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear | TextureFilter::LinearMipmapNearest => wgpu::FilterMode::Linear,
    }
}

fn copy_info(texture: &wgpu::Texture, mip_level: u32, x: u32, y: u32) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level,
        origin: wgpu::Origin3d { x, y, z: 0 },
        aspect: wgpu::TextureAspect::All,
    }
}

fn create_canvas(device: &wgpu::Device, width: u32, height: u32) -> Canvas {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("easel canvas"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CANVAS_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Canvas { texture, view, width, height }
}

fn present_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    canvas: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("easel present bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(canvas) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    })
}

fn create_presenter(device: &wgpu::Device, format: wgpu::TextureFormat, canvas: &wgpu::TextureView) -> Presenter {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("easel present shader"),
        source: wgpu::ShaderSource::Wgsl(crate::render::shaders::PRESENT_SHADER.into()),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("easel present bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("easel present pipeline layout"),
        bind_group_layouts: &[&layout],
        immediate_size: 0,
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("easel present pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("easel present sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    });

    let bind_group = present_bind_group(device, &layout, canvas, &sampler);
    Presenter { pipeline, layout, sampler, bind_group }
}

fn choose_surface_format(caps: &wgpu::SurfaceCapabilities, prefer_srgb: bool) -> Option<wgpu::TextureFormat> {
    let first = *caps.formats.first()?;
    caps.formats
        .iter()
        .copied()
        .find(|f| f.is_srgb() == prefer_srgb)
        .or(Some(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shaders::{
        ATTRIB_COLOR, ATTRIB_POSITION, ATTRIB_UV, BATCH_FRAGMENT_SHADER, BATCH_VERTEX_SHADER,
    };

    fn parsed(stage: ShaderStage, source: &str) -> CompiledShader {
        let module = naga::front::wgsl::parse_str(source).unwrap();
        let entry_point = match stage {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        };
        CompiledShader {
            stage,
            source: source.to_owned(),
            entry_point: entry_point.to_owned(),
            module,
        }
    }

    // ── reflection ────────────────────────────────────────────────────────

    #[test]
    fn batch_shaders_validate() {
        for src in [BATCH_VERTEX_SHADER, BATCH_FRAGMENT_SHADER, crate::render::shaders::PRESENT_SHADER] {
            let module = naga::front::wgsl::parse_str(src).unwrap();
            naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
                .validate(&module)
                .unwrap();
        }
    }

    #[test]
    fn attributes_resolve_to_locations() {
        let attrs = reflect_attributes(&parsed(ShaderStage::Vertex, BATCH_VERTEX_SHADER));
        assert_eq!(attrs.get(ATTRIB_POSITION), Some(&0));
        assert_eq!(attrs.get(ATTRIB_COLOR), Some(&1));
        assert_eq!(attrs.get(ATTRIB_UV), Some(&2));
    }

    #[test]
    fn resources_merge_across_stages() {
        let vs = parsed(ShaderStage::Vertex, BATCH_VERTEX_SHADER);
        let fs = parsed(ShaderStage::Fragment, BATCH_FRAGMENT_SHADER);
        let merged = merge_resources(
            reflect_resources(&vs.module).unwrap(),
            reflect_resources(&fs.module).unwrap(),
        )
        .unwrap();

        assert_eq!(merged["u_projection"].kind, ResourceKind::Buffer { size: 64 });
        assert_eq!(merged["u_texture_flag"].kind, ResourceKind::Buffer { size: 16 });
        assert_eq!(merged["u_sampler"].kind, ResourceKind::Texture);
        assert_eq!(merged["u_sampler"].location(), TEXTURE_GROUP * BINDINGS_PER_GROUP);
        assert_eq!(merged["u_sampler_state"].kind, ResourceKind::Sampler);
    }

    #[test]
    fn clashing_bindings_are_rejected() {
        let a = "@group(0) @binding(0) var<uniform> a: vec4<f32>;\n@fragment fn fs_main() -> @location(0) vec4<f32> { return a; }";
        let b = "@group(0) @binding(0) var<uniform> b: vec4<f32>;\n@fragment fn fs_main() -> @location(0) vec4<f32> { return b; }";
        let ra = reflect_resources(&naga::front::wgsl::parse_str(a).unwrap()).unwrap();
        let rb = reflect_resources(&naga::front::wgsl::parse_str(b).unwrap()).unwrap();
        let err = merge_resources(ra, rb).unwrap_err();
        assert!(err.contains("share group 0 binding 0"));
    }

    #[test]
    fn parse_errors_carry_source_context() {
        let src = "@vertex fn vs_main( -> @builtin(position) vec4<f32> { }";
        let err = naga::front::wgsl::parse_str(src).unwrap_err().emit_to_string(src);
        assert!(!err.is_empty());
    }

    // ── formats ───────────────────────────────────────────────────────────

    #[test]
    fn components_map_to_float_formats() {
        assert_eq!(vertex_format(2), wgpu::VertexFormat::Float32x2);
        assert_eq!(vertex_format(3), wgpu::VertexFormat::Float32x3);
        assert_eq!(vertex_format(4), wgpu::VertexFormat::Float32x4);
    }

    #[test]
    fn mipmap_filters_sample_linearly() {
        assert_eq!(filter_mode(TextureFilter::LinearMipmapNearest), wgpu::FilterMode::Linear);
        assert_eq!(filter_mode(TextureFilter::Nearest), wgpu::FilterMode::Nearest);
    }
}
