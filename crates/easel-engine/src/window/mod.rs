//! Windowed runtime: owns the `winit` event loop and window and feeds a
//! [`SketchDriver`](crate::core::SketchDriver) with frames and pointer events.

mod runtime;

pub use runtime::Runtime;
