use glam::Mat4;

use crate::coords::{ColorRgba, Vec2, Viewport};
use crate::device::GraphicsBackend;
use crate::paint::Color;
use crate::render::GpuHandles;

use super::config::SketchConfig;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub projection: Mat4,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub weight: f32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Mouse {
    pub pos: Vec2,
    pub prev_pos: Vec2,
    pub pressed: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Frame {
    /// Starts at 1 and increases by one after every drawn frame.
    pub count: u64,
    /// Frames per second derived from the last frame's delta time.
    pub rate: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
    pub resizeable: bool,
}

/// Rendering state of one canvas.
///
/// Owned by the frame loop and lent to sketch callbacks through
/// [`Env`](super::Env); never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub camera: Camera,
    pub fill: Color,
    pub background: Color,
    pub stroke: Stroke,
    pub mouse: Mouse,
    pub frame: Frame,
    pub size: Size,
    pub gpu: GpuHandles,
    size_request: Option<(u32, u32)>,
}

impl Environment {
    pub fn new(gpu: GpuHandles, config: &SketchConfig) -> Self {
        let viewport = Viewport::new(config.width as f32, config.height as f32);
        Self {
            camera: Camera { projection: viewport.ortho() },
            fill: Color::BLACK,
            background: Color::BLACK,
            stroke: Stroke { color: Color::BLACK, weight: 10.0 },
            mouse: Mouse::default(),
            frame: Frame { count: 1, rate: 10 },
            size: Size {
                width: config.width,
                height: config.height,
                resizeable: config.resizeable,
            },
            gpu,
            size_request: None,
        }
    }

    /// Adopts a new canvas size: viewport, clear color, projection and the
    /// projection uniform are all updated.
    ///
    /// An empty size is refused and leaves everything as it was; returns
    /// whether the size was taken.
    pub fn reset_size(&mut self, gl: &mut dyn GraphicsBackend, width: u32, height: u32) -> bool {
        let viewport = Viewport::new(width as f32, height as f32);
        if !viewport.is_valid() {
            log::warn!("ignoring canvas size {width}x{height}");
            return false;
        }
        self.size.width = width;
        self.size.height = height;
        self.camera.projection = viewport.ortho();

        gl.set_viewport(width, height);
        gl.set_clear_color(ColorRgba::black());
        gl.use_program(self.gpu.program);
        gl.set_uniform_mat4(self.gpu.u_projection, &self.camera.projection.to_cols_array());
        true
    }

    pub(crate) fn request_size(&mut self, width: u32, height: u32) {
        self.size_request = Some((width, height));
    }

    pub(crate) fn take_size_request(&mut self) -> Option<(u32, u32)> {
        self.size_request.take()
    }
}
