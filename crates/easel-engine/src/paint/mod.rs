//! Drawing-state colors.
//!
//! Sketch code works in 8-bit RGB, the same integer triples the fill, stroke
//! and background state is kept in. Conversion to normalized GPU colors lives
//! on [`Color::to_rgba`].

pub mod color;

pub use color::Color;
