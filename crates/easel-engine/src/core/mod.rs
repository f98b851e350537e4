//! Sketch runtime core.
//!
//! [`SketchDriver`] owns the per-canvas [`Environment`] and the batch
//! renderer and steps a [`Sketch`] through setup, frames and pointer
//! events. It knows nothing about windows; the windowed runtime and the
//! tests both drive it the same way.

mod config;
mod driver;
mod env;
mod environment;
mod sketch;

pub use config::SketchConfig;
pub use driver::{Phase, ResizeOutcome, SketchDriver};
pub use env::Env;
pub use environment::{Camera, Environment, Frame, Mouse, Size, Stroke};
pub use sketch::Sketch;
