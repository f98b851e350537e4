//! Easel engine crate.
//!
//! A small immediate-mode 2D sketch library: a [`core::Sketch`] draws
//! rectangles, lines, ellipses, images and bitmap text through a batch
//! renderer that targets any [`device::GraphicsBackend`].

pub mod assets;
pub mod coords;
pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod paint;
pub mod render;
pub mod text;
pub mod time;
pub mod window;

pub use crate::core::{Env, Sketch, SketchConfig};
pub use crate::paint::Color;
