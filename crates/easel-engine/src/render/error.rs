use std::fmt;

use crate::device::ShaderStage;

/// Failure while bringing up the renderer. Nothing is left half-initialized.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    ShaderCompile { stage: ShaderStage, log: String },
    ProgramLink { log: String },
    MissingAttribute(&'static str),
    MissingUniform(&'static str),
    /// Batch capacity outside `6..=65536` indices.
    InvalidCapacity(usize),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::ShaderCompile { stage, log } => {
                write!(f, "{stage} shader failed to compile: {log}")
            }
            SetupError::ProgramLink { log } => write!(f, "shader program failed to link: {log}"),
            SetupError::MissingAttribute(name) => write!(f, "vertex attribute `{name}` not found"),
            SetupError::MissingUniform(name) => write!(f, "uniform `{name}` not found"),
            SetupError::InvalidCapacity(n) => {
                write!(f, "batch capacity {n} out of range (6..=65536)")
            }
        }
    }
}

impl std::error::Error for SetupError {}

/// Failure while staging geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawError {
    /// One primitive needs more indices than the whole batch holds.
    PrimitiveTooLarge { needed: usize, capacity: usize },
    /// The font atlas has no glyph for this character.
    MissingGlyph(char),
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawError::PrimitiveTooLarge { needed, capacity } => write!(
                f,
                "primitive needs {needed} indices but the batch holds {capacity}"
            ),
            DrawError::MissingGlyph(c) => write!(f, "no glyph for {c:?} in font atlas"),
        }
    }
}

impl std::error::Error for DrawError {}
