//! Batch rendering.
//!
//! Every primitive is staged into one fixed-capacity [`Batch`] and drawn with
//! one shared shader program. A flush uploads the staged range, issues one
//! indexed draw and resets the cursors.
//!
//! Convention:
//! - geometry is in canvas pixels (top-left origin, +Y down)
//! - the vertex stage applies the orthographic projection uniform
//! - a per-draw texture flag picks vertex color (0) or sampled color (1)

mod batch;
mod error;
mod renderer;
pub mod shaders;

pub use batch::{Batch, Vertex, DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY};
pub use error::{DrawError, SetupError};
pub use renderer::{BatchMode, DrawTarget, GpuHandles, RenderStats, Renderer};
