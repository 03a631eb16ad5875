//! CPU-side geometry data structures.
//!
//! This module provides:
//! - [`VertexSemantic`] - Meaning of one vertex attribute
//! - [`VertexLayout`] - Ordered list of attributes forming an interleaved vertex
//! - [`CpuGeometry`] - Interleaved `f32` vertices plus `u32` indices

use crate::math::{Aabb, Vec3};

/// Meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    /// Object-space position.
    Position,
    /// Surface normal.
    Normal,
    /// Tangent vector.
    Tangent,
    /// Texture coordinates.
    TexCoord,
    /// Vertex color.
    Color,
}

/// One attribute of an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// What the attribute means.
    pub semantic: VertexSemantic,
    /// Number of `f32` components.
    pub components: u32,
}

impl VertexAttribute {
    /// Create a new attribute.
    pub const fn new(semantic: VertexSemantic, components: u32) -> Self {
        Self {
            semantic,
            components,
        }
    }
}

/// Interleaved vertex layout made of `f32` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Create a layout from an ordered attribute list.
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        Self { attributes }
    }

    /// Position (3) + normal (3). The layout the demo shaders consume.
    pub fn position_normal() -> Self {
        Self::new(vec![
            VertexAttribute::new(VertexSemantic::Position, 3),
            VertexAttribute::new(VertexSemantic::Normal, 3),
        ])
    }

    /// Position only.
    pub fn position_only() -> Self {
        Self::new(vec![VertexAttribute::new(VertexSemantic::Position, 3)])
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Number of `f32` values per vertex.
    pub fn stride_floats(&self) -> usize {
        self.attributes.iter().map(|a| a.components as usize).sum()
    }

    /// Bytes per vertex.
    pub fn stride_bytes(&self) -> usize {
        self.stride_floats() * std::mem::size_of::<f32>()
    }

    /// Offset in floats of the first attribute with `semantic`.
    pub fn offset_of(&self, semantic: VertexSemantic) -> Option<usize> {
        let mut offset = 0;
        for attribute in &self.attributes {
            if attribute.semantic == semantic {
                return Some(offset);
            }
            offset += attribute.components as usize;
        }
        None
    }
}

/// CPU-side geometry: interleaved vertices and a `u32` triangle list.
///
/// This is what a geometry loader hands over. It is never parsed from a file
/// by the renderer itself.
#[derive(Clone, Default)]
pub struct CpuGeometry {
    layout: VertexLayout,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    label: Option<String>,
}

impl CpuGeometry {
    /// Create geometry from interleaved vertex data and indices.
    pub fn new(layout: VertexLayout, vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        debug_assert!(
            layout.stride_floats() == 0 || vertices.len() % layout.stride_floats() == 0,
            "vertex data is not a whole number of vertices"
        );
        Self {
            layout,
            vertices,
            indices,
            label: None,
        }
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Vertex layout.
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Interleaved vertex floats.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    /// Triangle-list indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        match self.layout.stride_floats() {
            0 => 0,
            stride => (self.vertices.len() / stride) as u32,
        }
    }

    /// Number of indices.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Iterate over vertex positions.
    ///
    /// Yields nothing when the layout has no position attribute.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        let stride = self.layout.stride_floats();
        let offset = self.layout.offset_of(VertexSemantic::Position);
        self.vertices
            .chunks_exact(stride.max(1))
            .filter_map(move |v| {
                let o = offset?;
                Some(Vec3::new(v[o], v[o + 1], v[o + 2]))
            })
    }

    /// Bounding box of all vertex positions.
    pub fn extents(&self) -> Aabb {
        Aabb::from_points(self.positions())
    }

    /// Raw vertex bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Raw index bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

impl std::fmt::Debug for CpuGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuGeometry")
            .field("label", &self.label)
            .field("vertex_count", &self.vertex_count())
            .field("index_count", &self.index_count())
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_vertices() -> CpuGeometry {
        CpuGeometry::new(
            VertexLayout::position_normal(),
            vec![
                -1.0, 0.0, 2.0, 0.0, 1.0, 0.0, //
                3.0, -4.0, 0.5, 0.0, 1.0, 0.0,
            ],
            vec![0, 1, 0],
        )
    }

    #[test]
    fn test_layout_stride() {
        let layout = VertexLayout::position_normal();
        assert_eq!(layout.stride_floats(), 6);
        assert_eq!(layout.stride_bytes(), 24);
        assert_eq!(layout.offset_of(VertexSemantic::Normal), Some(3));
        assert_eq!(layout.offset_of(VertexSemantic::TexCoord), None);
    }

    #[test]
    fn test_geometry_counts() {
        let geometry = two_vertices();
        assert_eq!(geometry.vertex_count(), 2);
        assert_eq!(geometry.index_count(), 3);
        assert_eq!(geometry.vertex_bytes().len(), 48);
        assert_eq!(geometry.index_bytes().len(), 12);
    }

    #[test]
    fn test_geometry_extents() {
        let extents = two_vertices().extents();
        assert_eq!(extents.min, Vec3::new(-1.0, -4.0, 0.5));
        assert_eq!(extents.max, Vec3::new(3.0, 0.0, 2.0));
    }

    #[test]
    fn test_extents_without_positions() {
        let geometry = CpuGeometry::new(
            VertexLayout::new(vec![VertexAttribute::new(VertexSemantic::Color, 4)]),
            vec![1.0; 8],
            vec![],
        );
        assert!(geometry.extents().is_empty());
    }
}
