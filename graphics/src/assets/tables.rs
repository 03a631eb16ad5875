//! GPU-side tables for shader-driven LOD selection.

use kestrel_core::math::Aabb;

use super::GeometryRange;

/// Per-asset-type record.
///
/// `lod_first` indexes the LOD table, whose entries for this type are sorted
/// by ascending threshold. Records are sorted by `asset_id`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AssetTypeRecord {
    pub bbox_min: [f32; 4],
    pub bbox_max: [f32; 4],
    pub lod_first: u32,
    pub lod_count: u32,
    pub asset_id: u32,
    pub _padding: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<AssetTypeRecord>(), 48);

impl AssetTypeRecord {
    pub(crate) fn new(asset_id: u32, bounds: &Aabb, lod_first: u32, lod_count: u32) -> Self {
        let (min, max) = if bounds.is_empty() {
            ([0.0; 3], [0.0; 3])
        } else {
            bounds.to_arrays()
        };
        Self {
            bbox_min: [min[0], min[1], min[2], 1.0],
            bbox_max: [max[0], max[1], max[2], 1.0],
            lod_first,
            lod_count,
            asset_id,
            _padding: 0,
        }
    }
}

/// Per-LOD record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LodRecord {
    pub threshold: f32,
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_offset: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<LodRecord>(), 16);

impl LodRecord {
    pub(crate) fn new(threshold: f32, range: &GeometryRange) -> Self {
        Self {
            threshold,
            first_index: range.first_index,
            index_count: range.index_count,
            vertex_offset: range.vertex_offset,
        }
    }
}
