//! Fixed shader pair used by every batch draw, plus the names the renderer
//! looks up after linking.

pub const BATCH_VERTEX_SHADER: &str = include_str!("batch_vs.wgsl");
pub const BATCH_FRAGMENT_SHADER: &str = include_str!("batch_fs.wgsl");

/// Fullscreen blit of the offscreen canvas onto the window surface.
pub const PRESENT_SHADER: &str = include_str!("present.wgsl");

pub const ATTRIB_POSITION: &str = "a_position";
pub const ATTRIB_COLOR: &str = "a_color";
pub const ATTRIB_UV: &str = "a_uv";

pub const UNIFORM_PROJECTION: &str = "u_projection";
pub const UNIFORM_TEXTURE_FLAG: &str = "u_texture_flag";
pub const UNIFORM_SAMPLER: &str = "u_sampler";
