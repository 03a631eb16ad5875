//! Asset and level-of-detail aggregation.
//!
//! The [`AssetAggregator`] merges many [`CpuGeometry`] values into one shared
//! vertex array and one shared index array, keeps a table of asset types with
//! their LOD variants, and turns a list of visible instances into indexed
//! indirect draw commands.
//!
//! ```text
//! shared vertices: [ triangle | cube ......... | sphere lod0 ....... | sphere lod1 .. ]
//! shared indices:  [ 0 1 2    | 0 1 2 2 3 0 ... | ...                 | ...            ]
//!                    ^ first_index / base_vertex per geometry range
//! ```
//!
//! The aggregator never parses a file. Geometry comes from the caller or from
//! a [`GeometryLoader`].

mod aggregator;
mod tables;

pub use aggregator::AssetAggregator;
pub use tables::{AssetTypeRecord, LodRecord};

use kestrel_core::math::{Aabb, Mat4, mat4_to_cols_array_2d};
use kestrel_core::mesh::CpuGeometry;

use crate::resources::LogicalResourceId;
use crate::types::DrawIndexedIndirectArgs;

/// Identifier of an asset type, chosen by the caller.
pub type AssetTypeId = u32;

/// Handle to a geometry range inside the aggregated storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle(u32);

impl GeometryHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw handle value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Where one geometry lives inside the shared storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryRange {
    /// First index in the shared index array.
    pub first_index: u32,
    /// Number of indices.
    pub index_count: u32,
    /// First vertex in the shared vertex array (the draw's base vertex).
    pub vertex_offset: u32,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Bounding box of the geometry's positions.
    pub extents: Aabb,
}

/// One level of detail of an asset type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodVariant {
    /// Smallest distance at which this variant is selected.
    pub threshold: f32,
    /// Geometry drawn for this variant.
    pub geometry: GeometryHandle,
}

/// A mesh category with its bounds and LOD variants.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetType {
    /// Id given at registration.
    pub id: AssetTypeId,
    /// Bounding volume given at registration.
    pub declared_bounds: Aabb,
    /// Declared bounds united with every registered LOD's extents.
    pub bounds: Aabb,
    /// Variants sorted by ascending threshold (finest first).
    pub lods: Vec<LodVariant>,
}

impl AssetType {
    /// Index of the variant drawn at `distance`.
    ///
    /// The coarsest variant whose threshold is at most `distance`, or the
    /// finest variant if none qualifies. `None` if the type has no variants.
    pub fn select_lod(&self, distance: f32) -> Option<usize> {
        if self.lods.is_empty() {
            return None;
        }
        let qualifying = self.lods.partition_point(|lod| lod.threshold <= distance);
        Some(qualifying.saturating_sub(1))
    }
}

/// One instance to draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetInstance {
    /// Asset type drawn.
    pub asset: AssetTypeId,
    /// Object-to-world transform.
    pub transform: Mat4,
    /// Distance used for LOD selection.
    pub distance: f32,
}

impl AssetInstance {
    /// Create an instance.
    pub fn new(asset: AssetTypeId, transform: Mat4, distance: f32) -> Self {
        Self {
            asset,
            transform,
            distance,
        }
    }
}

/// Per-instance record in the instance buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceData {
    /// Column-major model matrix.
    pub model: [[f32; 4]; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<InstanceData>(), 64);

impl InstanceData {
    /// Build the record for a transform.
    pub fn from_transform(transform: &Mat4) -> Self {
        Self {
            model: mat4_to_cols_array_2d(transform),
        }
    }
}

/// One draw group of an [`IndirectBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawGroup {
    /// Asset type.
    pub asset: AssetTypeId,
    /// Selected LOD index within the asset type.
    pub lod: u32,
    /// Geometry drawn.
    pub geometry: GeometryHandle,
}

/// Output of [`AssetAggregator::build_indirect_commands`].
///
/// `commands[i]` draws `groups[i]`, whose instances are
/// `instances[first_instance .. first_instance + instance_count]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndirectBatch {
    /// Draw groups ordered by asset id, then LOD index.
    pub groups: Vec<DrawGroup>,
    /// One indexed indirect command per group.
    pub commands: Vec<DrawIndexedIndirectArgs>,
    /// Instance records in group order.
    pub instances: Vec<InstanceData>,
}

impl IndirectBatch {
    /// Number of draw commands.
    pub fn draw_count(&self) -> usize {
        self.commands.len()
    }

    /// Command bytes, ready for an indirect buffer.
    pub fn command_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.commands)
    }

    /// Instance bytes, ready for an instance buffer.
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

/// Logical resources a batch is published into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTargets {
    /// Indirect command resource (PerImage or Single).
    pub commands: LogicalResourceId,
    /// Instance data resource.
    pub instances: LogicalResourceId,
}

/// Logical resources the shared geometry is published into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryTargets {
    /// Shared vertex resource.
    pub vertices: LogicalResourceId,
    /// Shared index resource.
    pub indices: LogicalResourceId,
}

/// Supplies geometry on demand.
///
/// Implemented by the host's asset pipeline. File formats are the loader's
/// business.
pub trait GeometryLoader {
    /// Load the geometry identified by `key`.
    fn load(&self, key: &str) -> Result<CpuGeometry, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::math::Vec3;

    fn asset_with_thresholds(thresholds: &[f32]) -> AssetType {
        AssetType {
            id: 0,
            declared_bounds: Aabb::empty(),
            bounds: Aabb::empty(),
            lods: thresholds
                .iter()
                .enumerate()
                .map(|(i, &threshold)| LodVariant {
                    threshold,
                    geometry: GeometryHandle::new(i as u32),
                })
                .collect(),
        }
    }

    #[test]
    fn test_select_lod() {
        let asset = asset_with_thresholds(&[0.0, 50.0, 100.0]);
        assert_eq!(asset.select_lod(10.0), Some(0));
        assert_eq!(asset.select_lod(50.0), Some(1));
        assert_eq!(asset.select_lod(99.0), Some(1));
        assert_eq!(asset.select_lod(1000.0), Some(2));
    }

    #[test]
    fn test_select_lod_falls_back_to_finest() {
        let asset = asset_with_thresholds(&[20.0, 40.0]);
        assert_eq!(asset.select_lod(5.0), Some(0));
        assert_eq!(asset_with_thresholds(&[]).select_lod(5.0), None);
    }

    #[test]
    fn test_instance_data_layout() {
        let t = kestrel_core::math::mat4_from_translation(Vec3::new(1.0, 2.0, 3.0));
        let data = InstanceData::from_transform(&t);
        assert_eq!(data.model[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
