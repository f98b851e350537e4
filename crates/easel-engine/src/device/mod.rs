//! Graphics backends.
//!
//! [`GraphicsBackend`] is the GL-shaped seam the renderer draws through.
//! [`WgpuBackend`] implements it on a real device and window surface;
//! [`RecordingBackend`] records every call for tests and headless use.

mod backend;
mod gpu;
mod recording;

pub use backend::{
    AttribLocation, BufferId, BufferKind, GraphicsBackend, ProgramId, ShaderId, ShaderStage, TextureFilter,
    TextureId, UniformLocation,
};
pub use gpu::{GpuInit, SurfaceErrorAction, WgpuBackend};
pub use recording::{Call, DrawCall, RecordingBackend};
