//! Asynchronous image assets.
//!
//! Loads return a pending [`ImageHandle`] right away. The frame loop polls
//! the [`AssetLoader`] on the render thread, which uploads finished decodes
//! and fills their handles before any drawing in that tick.

mod loader;

pub use loader::{AssetLoader, AssetState, Image, ImageHandle};
