//! CPU-side geometry types and generators.
//!
//! This module provides GPU-agnostic geometry data structures:
//!
//! - [`VertexLayout`] - Interleaved `f32` vertex attributes
//! - [`CpuGeometry`] - CPU-side vertices, indices and extents
//! - Generators for common shapes (triangle, pentagon, cube, sphere, cylinder)
//!
//! These types are re-exported by `kestrel-graphics` for convenience.

mod data;
pub mod generators;

pub use data::{CpuGeometry, VertexAttribute, VertexLayout, VertexSemantic};
