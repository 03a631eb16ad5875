use std::collections::BTreeMap;

use kestrel_core::math::Aabb;
use kestrel_core::mesh::{CpuGeometry, VertexLayout};

use crate::error::AssetError;
use crate::frame::FrameContext;
use crate::resources::ResourceManager;
use crate::types::DrawIndexedIndirectArgs;

use super::tables::{AssetTypeRecord, LodRecord};
use super::{
    AssetInstance, AssetType, AssetTypeId, BatchTargets, DrawGroup, GeometryHandle,
    GeometryLoader, GeometryRange, GeometryTargets, IndirectBatch, InstanceData, LodVariant,
};

/// Merges geometry into shared storage and batches instances into indirect draws.
///
/// # Example
///
/// ```ignore
/// let mut assets = AssetAggregator::new(VertexLayout::position_normal());
/// let fine = assets.add_geometry(generate_sphere(1.0, 32, 16))?;
/// let coarse = assets.add_geometry(generate_sphere(1.0, 8, 4))?;
///
/// assets.register_asset_type(1, Aabb::from_corners([-1.0; 3], [1.0; 3]))?;
/// assets.register_lod(1, 0.0, fine)?;
/// assets.register_lod(1, 50.0, coarse)?;
///
/// let batch = assets.build_indirect_commands(&instances)?;
/// assets.publish(&batch, &manager, targets, &ctx)?;
/// ```
#[derive(Debug)]
pub struct AssetAggregator {
    layout: VertexLayout,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    geometries: Vec<GeometryRange>,
    asset_types: BTreeMap<AssetTypeId, AssetType>,
}

impl AssetAggregator {
    /// Create an empty aggregator whose shared storage uses `layout`.
    pub fn new(layout: VertexLayout) -> Self {
        Self {
            layout,
            vertices: Vec::new(),
            indices: Vec::new(),
            geometries: Vec::new(),
            asset_types: BTreeMap::new(),
        }
    }

    /// Vertex layout of the shared storage.
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Append geometry to the shared storage.
    pub fn add_geometry(&mut self, geometry: CpuGeometry) -> Result<GeometryHandle, AssetError> {
        if geometry.layout() != &self.layout {
            return Err(AssetError::LayoutMismatch {
                label: geometry.label().unwrap_or("<unnamed>").to_string(),
            });
        }

        let range = GeometryRange {
            first_index: self.indices.len() as u32,
            index_count: geometry.index_count(),
            vertex_offset: self.vertex_count(),
            vertex_count: geometry.vertex_count(),
            extents: geometry.extents(),
        };
        self.vertices.extend_from_slice(geometry.vertices());
        self.indices.extend_from_slice(geometry.indices());

        let handle = GeometryHandle::new(self.geometries.len() as u32);
        log::debug!(
            "Added geometry {:?} as {:?}: {} vertices at {}, {} indices at {}",
            geometry.label(),
            handle,
            range.vertex_count,
            range.vertex_offset,
            range.index_count,
            range.first_index
        );
        self.geometries.push(range);
        Ok(handle)
    }

    /// Load geometry through `loader` and append it.
    pub fn load_geometry(
        &mut self,
        loader: &dyn GeometryLoader,
        key: &str,
    ) -> Result<GeometryHandle, AssetError> {
        let geometry = loader.load(key).map_err(|reason| AssetError::LoadFailed {
            key: key.to_string(),
            reason,
        })?;
        self.add_geometry(geometry)
    }

    /// Range of a geometry inside the shared storage.
    pub fn geometry(&self, handle: GeometryHandle) -> Result<&GeometryRange, AssetError> {
        self.geometries
            .get(handle.index())
            .ok_or(AssetError::UnknownGeometry(handle.raw()))
    }

    /// Declare an asset type.
    pub fn register_asset_type(
        &mut self,
        id: AssetTypeId,
        bounding_volume: Aabb,
    ) -> Result<(), AssetError> {
        if self.asset_types.contains_key(&id) {
            return Err(AssetError::DuplicateAssetId(id));
        }
        self.asset_types.insert(
            id,
            AssetType {
                id,
                declared_bounds: bounding_volume,
                bounds: bounding_volume,
                lods: Vec::new(),
            },
        );
        log::debug!("Registered asset type {}", id);
        Ok(())
    }

    /// Add a LOD variant to an asset type.
    ///
    /// Variants stay sorted by threshold. A variant with an existing threshold
    /// replaces the old one. The asset type's bounds are the declared volume
    /// united with the extents of its current variants.
    pub fn register_lod(
        &mut self,
        asset: AssetTypeId,
        threshold: f32,
        geometry: GeometryHandle,
    ) -> Result<(), AssetError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AssetError::InvalidThreshold { asset, threshold });
        }
        self.geometry(geometry)?;
        let geometries = &self.geometries;
        let asset_type = self
            .asset_types
            .get_mut(&asset)
            .ok_or(AssetError::UnknownAssetId(asset))?;

        let variant = LodVariant {
            threshold,
            geometry,
        };
        match asset_type
            .lods
            .binary_search_by(|lod| lod.threshold.total_cmp(&threshold))
        {
            Ok(existing) => {
                log::debug!(
                    "Asset type {}: replacing LOD at threshold {}",
                    asset,
                    threshold
                );
                asset_type.lods[existing] = variant;
            }
            Err(position) => asset_type.lods.insert(position, variant),
        }
        asset_type.bounds = asset_type
            .lods
            .iter()
            .filter_map(|lod| geometries.get(lod.geometry.index()))
            .fold(asset_type.declared_bounds, |bounds, range| bounds.union(&range.extents));
        Ok(())
    }

    /// A registered asset type.
    pub fn asset_type(&self, id: AssetTypeId) -> Result<&AssetType, AssetError> {
        self.asset_types
            .get(&id)
            .ok_or(AssetError::UnknownAssetId(id))
    }

    /// Registered asset types in id order.
    pub fn asset_types(&self) -> impl Iterator<Item = &AssetType> {
        self.asset_types.values()
    }

    /// Select a LOD per instance, group by `(asset, lod)` and emit one
    /// indexed indirect command per group.
    ///
    /// Groups are ordered by asset id, then LOD index. Instances keep their
    /// input order within a group and are laid out contiguously, so each
    /// command's `first_instance` indexes the batch's instance records.
    pub fn build_indirect_commands(
        &self,
        instances: &[AssetInstance],
    ) -> Result<IndirectBatch, AssetError> {
        let mut grouped: BTreeMap<(AssetTypeId, u32), Vec<&AssetInstance>> = BTreeMap::new();
        for instance in instances {
            let asset_type = self.asset_type(instance.asset)?;
            let lod = asset_type
                .select_lod(instance.distance)
                .ok_or(AssetError::NoLevelOfDetail(instance.asset))?;
            grouped
                .entry((instance.asset, lod as u32))
                .or_default()
                .push(instance);
        }

        let mut batch = IndirectBatch {
            groups: Vec::with_capacity(grouped.len()),
            commands: Vec::with_capacity(grouped.len()),
            instances: Vec::with_capacity(instances.len()),
        };
        for ((asset, lod), members) in grouped {
            let geometry = self.asset_type(asset)?.lods[lod as usize].geometry;
            let range = self.geometry(geometry)?;
            let command = DrawIndexedIndirectArgs::new(range.index_count, members.len() as u32)
                .with_first_index(range.first_index)
                .with_base_vertex(range.vertex_offset as i32)
                .with_first_instance(batch.instances.len() as u32);

            batch.groups.push(DrawGroup {
                asset,
                lod,
                geometry,
            });
            batch.commands.push(command);
            batch.instances.extend(
                members
                    .iter()
                    .map(|instance| InstanceData::from_transform(&instance.transform)),
            );
        }

        log::trace!(
            "Built {} indirect commands for {} instances",
            batch.commands.len(),
            batch.instances.len()
        );
        Ok(batch)
    }

    /// Write a batch's commands and instance records into their resources.
    pub fn publish(
        &self,
        batch: &IndirectBatch,
        manager: &ResourceManager,
        targets: BatchTargets,
        ctx: &FrameContext,
    ) -> Result<(), AssetError> {
        manager.write(targets.commands, ctx, batch.command_bytes())?;
        manager.write(targets.instances, ctx, batch.instance_bytes())?;
        Ok(())
    }

    /// Write the shared vertex and index arrays into their resources.
    pub fn publish_geometry(
        &self,
        manager: &ResourceManager,
        targets: GeometryTargets,
        ctx: &FrameContext,
    ) -> Result<(), AssetError> {
        manager.write(targets.vertices, ctx, self.vertex_bytes())?;
        manager.write(targets.indices, ctx, self.index_bytes())?;
        log::debug!(
            "Published {} vertex bytes and {} index bytes",
            self.vertex_bytes().len(),
            self.index_bytes().len()
        );
        Ok(())
    }

    /// One record per registered asset type in ascending id order, for
    /// GPU-side LOD selection. Shaders find a type by searching `asset_id`.
    pub fn type_table(&self) -> Vec<AssetTypeRecord> {
        let mut first_lod = 0u32;
        self.asset_types()
            .map(|asset_type| {
                let lod_count = asset_type.lods.len() as u32;
                let record =
                    AssetTypeRecord::new(asset_type.id, &asset_type.bounds, first_lod, lod_count);
                first_lod += lod_count;
                record
            })
            .collect()
    }

    /// LOD records of every asset type, concatenated in asset id order.
    pub fn lod_table(&self) -> Vec<LodRecord> {
        self.asset_types()
            .flat_map(|asset_type| asset_type.lods.iter())
            .filter_map(|lod| {
                let range = self.geometries.get(lod.geometry.index())?;
                Some(LodRecord::new(lod.threshold, range))
            })
            .collect()
    }

    /// Number of vertices in the shared storage.
    pub fn vertex_count(&self) -> u32 {
        match self.layout.stride_floats() {
            0 => 0,
            stride => (self.vertices.len() / stride) as u32,
        }
    }

    /// Number of indices in the shared storage.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Shared vertex bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Shared index bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
