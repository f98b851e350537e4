use bytemuck::{Pod, Zeroable};

use crate::coords::{ColorRgba, Vec2};

use super::error::SetupError;

/// Index capacity used when a sketch does not ask for another one.
pub const DEFAULT_CAPACITY: usize = 6 * 10_000;

/// Largest capacity whose vertex indices all fit in `u16`.
pub const MAX_CAPACITY: usize = u16::MAX as usize + 1;

/// Smallest capacity that still holds one quad.
pub const MIN_CAPACITY: usize = 6;

/// Interleaved vertex: position (z = 0), color, texture coordinate.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Scalars per vertex.
    pub const FLOATS: usize = 9;
    /// Byte stride between vertices.
    pub const STRIDE: u32 = (Self::FLOATS * 4) as u32;

    pub const POSITION_OFFSET: u32 = 0;
    pub const COLOR_OFFSET: u32 = 12;
    pub const UV_OFFSET: u32 = 28;

    #[inline]
    pub fn solid(p: Vec2, color: ColorRgba) -> Self {
        Self {
            position: [p.x, p.y, 0.0],
            color: color.to_array(),
            uv: [0.0, 0.0],
        }
    }

    #[inline]
    pub fn textured(p: Vec2, uv: Vec2) -> Self {
        Self {
            position: [p.x, p.y, 0.0],
            color: ColorRgba::zero().to_array(),
            uv: [uv.x, uv.y],
        }
    }
}

/// Fixed-capacity staging area for one draw call.
///
/// Capacity counts index elements. Vertex storage holds the same number of
/// vertices, which is never the binding limit since every primitive stages
/// at least as many indices as vertices.
///
/// Invariants, outside an in-progress emit:
/// - `element_ptr() <= capacity()`
/// - `vertex_ptr() <= capacity() * Vertex::FLOATS`
#[derive(Debug)]
pub struct Batch {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    capacity: usize,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Result<Self, SetupError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(SetupError::InvalidCapacity(capacity));
        }
        Ok(Self {
            vertices: Vec::with_capacity(capacity),
            indices: Vec::with_capacity(capacity),
            capacity,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Vertex write cursor in scalar units.
    #[inline]
    pub fn vertex_ptr(&self) -> usize {
        self.vertices.len() * Vertex::FLOATS
    }

    /// Index write cursor.
    #[inline]
    pub fn element_ptr(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether `vertices` more vertices and `indices` more indices can be staged.
    #[inline]
    pub fn fits(&self, vertices: usize, indices: usize) -> bool {
        self.capacity - self.indices.len() >= indices
            && self.capacity - self.vertices.len() >= vertices
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Staged vertices as the flat float array that is uploaded.
    pub fn vertex_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Index the next staged vertex will get.
    ///
    /// Callers check [`fits`](Self::fits) first, so this is below `capacity`.
    #[inline]
    pub(crate) fn next_index(&self) -> u16 {
        debug_assert!(self.vertices.len() < self.capacity);
        self.vertices.len() as u16
    }

    #[inline]
    pub(crate) fn push_vertex(&mut self, v: Vertex) {
        self.vertices.push(v);
    }

    #[inline]
    pub(crate) fn push_index(&mut self, i: u16) {
        self.indices.push(i);
    }

    /// Two triangles over four vertices staged from `base` in quad-corner order.
    #[inline]
    pub(crate) fn push_quad_indices(&mut self, base: u16) {
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 1, base + 2, base + 3]);
    }

    pub fn reset(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(batch: &mut Batch) {
        let base = batch.next_index();
        for _ in 0..4 {
            batch.push_vertex(Vertex::solid(Vec2::zero(), ColorRgba::black()));
        }
        batch.push_quad_indices(base);
    }

    // ── capacity ──────────────────────────────────────────────────────────

    #[test]
    fn capacity_bounds_are_enforced() {
        assert_eq!(Batch::with_capacity(5).unwrap_err(), SetupError::InvalidCapacity(5));
        assert!(Batch::with_capacity(MAX_CAPACITY + 1).is_err());
        assert!(Batch::with_capacity(MIN_CAPACITY).is_ok());
        assert!(Batch::with_capacity(MAX_CAPACITY).is_ok());
    }

    #[test]
    fn fits_counts_remaining_indices() {
        let mut b = Batch::with_capacity(12).unwrap();
        quad(&mut b);
        assert!(b.fits(4, 6));
        quad(&mut b);
        assert!(!b.fits(4, 6));
        assert!(b.fits(0, 0));
    }

    // ── cursors ───────────────────────────────────────────────────────────

    #[test]
    fn cursors_measure_scalars_and_elements() {
        let mut b = Batch::with_capacity(DEFAULT_CAPACITY).unwrap();
        quad(&mut b);
        assert_eq!(b.vertex_ptr(), 4 * 9);
        assert_eq!(b.element_ptr(), 6);
        assert_eq!(b.vertex_floats().len(), b.vertex_ptr());
    }

    #[test]
    fn quad_indices_follow_base() {
        let mut b = Batch::with_capacity(DEFAULT_CAPACITY).unwrap();
        quad(&mut b);
        quad(&mut b);
        assert_eq!(&b.indices()[6..], &[4, 5, 6, 5, 6, 7]);
    }

    #[test]
    fn reset_zeroes_both_cursors() {
        let mut b = Batch::with_capacity(DEFAULT_CAPACITY).unwrap();
        quad(&mut b);
        b.reset();
        assert_eq!((b.vertex_ptr(), b.element_ptr()), (0, 0));
        assert!(b.is_empty());
    }

    // ── vertex layout ─────────────────────────────────────────────────────

    #[test]
    fn vertex_layout_is_nine_floats() {
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
        assert_eq!(Vertex::STRIDE, 36);
    }

    #[test]
    fn textured_vertex_zeroes_color() {
        let v = Vertex::textured(Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.25));
        assert_eq!(v.color, [0.0; 4]);
        assert_eq!(v.uv, [0.5, 0.25]);
        assert_eq!(v.position, [1.0, 2.0, 0.0]);
    }
}
