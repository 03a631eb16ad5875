//! # Kestrel Demos
//!
//! Demo scenes for the Kestrel frame renderer.
//!
//! ## Available Demos
//!
//! - `workflow_demo` - Five procedural assets drawn by a single `Ortho3D`
//!   operation, with per-image camera and instance data

use std::sync::atomic::{AtomicBool, Ordering};

use kestrel_core::math::{
    Aabb, Mat4, Vec3, Vec4, look_at_rh, mat4_from_scale_rotation_translation,
    mat4_to_cols_array_2d, orthographic_rh, quat_from_rotation_y,
};
use kestrel_graphics::{
    AssetAggregator, AssetInstance, AssetTypeId, AttachmentBinding, AttachmentSize,
    AttachmentType, BatchTargets, GeometryLoader, GeometryTargets, GraphicsResult,
    LoadOp, LogicalResourceId, RenderOperation, RenderWorkflow, ReplicationPolicy,
    ResourceDescriptor, ResourceKind, ResourceManager, ResourceType, TaskContext, TextureFormat,
    UpdateGraph, VertexLayout,
};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Procedural geometry keys, indexed by asset type id.
pub const ASSET_KEYS: [&str; 5] = ["triangle", "cube", "cylinder", "icosphere", "pentagon"];

/// Distance beyond which the coarse variant of an asset is drawn.
pub const COARSE_LOD_DISTANCE: f32 = 12.0;

/// Uniform color material.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Material {
    pub color: [f32; 4],
}

/// Red, green, blue, white and black.
pub const MATERIALS: [Material; 5] = [
    Material { color: [1.0, 0.0, 0.0, 1.0] },
    Material { color: [0.0, 1.0, 0.0, 1.0] },
    Material { color: [0.0, 0.0, 1.0, 1.0] },
    Material { color: [1.0, 1.0, 1.0, 1.0] },
    Material { color: [0.0, 0.0, 0.0, 1.0] },
];

/// Point light.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Light {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

/// Camera uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraRecord {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub position: [f32; 4],
}

/// Per-instance model and model-view-projection matrices.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceMatrices {
    pub model: [[f32; 4]; 4],
    pub mvp: [[f32; 4]; 4],
}

/// The single-operation workflow: `Ortho3D` clears a depth buffer and the
/// surface, then draws every asset.
pub fn build_ortho_workflow(workflow: &mut RenderWorkflow) -> GraphicsResult<()> {
    workflow.add_resource_type(
        ResourceType::new(
            "depthBuffer",
            AttachmentType::Depth,
            TextureFormat::Depth32Float,
            AttachmentSize::surface(),
        )
        .with_persistent(false),
    )?;
    workflow.add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm))?;

    let ortho = workflow.add_render_operation(RenderOperation::graphics("Ortho3D"))?;
    workflow.set_operation_pipeline(ortho, "shaders/3D")?;
    workflow.add_attachment_output(
        AttachmentBinding::depth("Ortho3D", "depthBuffer", "depthOutput")
            .with_load_op(LoadOp::clear_depth(1.0)),
    )?;
    workflow.add_attachment_output(
        AttachmentBinding::color("Ortho3D", "surface", "colorOutput")
            .with_load_op(LoadOp::clear_color(0.0, 0.0, 0.0, 0.0)),
    )?;
    Ok(())
}

/// Scene data and the resources it is published through.
pub struct DemoScene {
    pub assets: AssetAggregator,
    pub materials: LogicalResourceId,
    pub lights: LogicalResourceId,
    pub camera: LogicalResourceId,
    pub matrices: LogicalResourceId,
    pub batch: BatchTargets,
    pub geometry: GeometryTargets,
    light_data: Vec<Light>,
    aspect: f32,
    published: AtomicBool,
}

impl DemoScene {
    /// Load the assets and declare the scene resources.
    ///
    /// Every asset gets a fine variant and a coarse one at
    /// [`COARSE_LOD_DISTANCE`] that reuses the cube.
    pub fn new(
        loader: &dyn GeometryLoader,
        manager: &ResourceManager,
        aspect: f32,
    ) -> GraphicsResult<Self> {
        let mut assets = AssetAggregator::new(VertexLayout::position_normal());
        let coarse = assets.load_geometry(loader, "cube")?;
        for (id, key) in ASSET_KEYS.iter().enumerate() {
            let geometry = assets.load_geometry(loader, key)?;
            let id = id as AssetTypeId;
            assets.register_asset_type(id, Aabb::from_corners([-0.5; 3], [0.5; 3]))?;
            assets.register_lod(id, 0.0, geometry)?;
            assets.register_lod(id, COARSE_LOD_DISTANCE, coarse)?;
        }
        log::info!(
            "Loaded {} assets: {} vertices, {} indices",
            ASSET_KEYS.len(),
            assets.vertex_count(),
            assets.index_count()
        );

        let materials = manager.declare(
            "materials",
            ResourceDescriptor::uniform(std::mem::size_of_val(&MATERIALS) as u64),
            ReplicationPolicy::Single,
        )?;
        let lights = manager.declare(
            "lights",
            ResourceDescriptor::uniform(2 * std::mem::size_of::<Light>() as u64),
            ReplicationPolicy::Single,
        )?;
        let camera = manager.declare(
            "camera",
            ResourceDescriptor::uniform(std::mem::size_of::<CameraRecord>() as u64),
            ReplicationPolicy::PerImage,
        )?;
        let matrices = manager.declare(
            "instanceMatrices",
            ResourceDescriptor::storage(1024),
            ReplicationPolicy::PerImage,
        )?;
        let batch = BatchTargets {
            commands: manager.declare(
                "drawCommands",
                ResourceDescriptor::indirect(256),
                ReplicationPolicy::PerImage,
            )?,
            instances: manager.declare(
                "instances",
                ResourceDescriptor::storage(1024),
                ReplicationPolicy::PerImage,
            )?,
        };
        let geometry = GeometryTargets {
            vertices: manager.declare(
                "vertices",
                ResourceDescriptor::buffer(ResourceKind::Vertex, assets.vertex_bytes().len() as u64),
                ReplicationPolicy::Single,
            )?,
            indices: manager.declare(
                "indices",
                ResourceDescriptor::buffer(ResourceKind::Index, assets.index_bytes().len() as u64),
                ReplicationPolicy::Single,
            )?,
        };

        Ok(Self {
            assets,
            materials,
            lights,
            camera,
            matrices,
            batch,
            geometry,
            light_data: vec![
                Light {
                    position: [5.0, 5.0, 5.0, 1.0],
                    color: [1.0, 1.0, 1.0, 1.0],
                },
                Light {
                    position: [-5.0, 3.0, 0.0, 1.0],
                    color: [0.4, 0.4, 0.6, 1.0],
                },
            ],
            aspect,
            published: AtomicBool::new(false),
        })
    }

    /// Whether geometry, materials and lights have been written.
    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }

    /// Eye position, view and projection at `time` seconds. The camera
    /// orbits the origin.
    pub fn camera_matrices(&self, time: f32) -> (Vec3, Mat4, Mat4) {
        let eye = Vec3::new(10.0 * time.cos(), 4.0, 10.0 * time.sin());
        let view = look_at_rh(&eye, &Vec3::zeros(), &Vec3::y());
        let half_height = 4.0;
        let projection = orthographic_rh(
            -half_height * self.aspect,
            half_height * self.aspect,
            -half_height,
            half_height,
            0.1,
            100.0,
        );
        (eye, view, projection)
    }

    /// Camera uniform block at `time` seconds.
    pub fn camera_at(&self, time: f32) -> CameraRecord {
        let (eye, view, projection) = self.camera_matrices(time);
        CameraRecord {
            view: mat4_to_cols_array_2d(&view),
            projection: mat4_to_cols_array_2d(&projection),
            position: Vec4::new(eye.x, eye.y, eye.z, 1.0).into(),
        }
    }

    /// Asset instances at `time`: a ring of every asset, spinning.
    pub fn instances_at(&self, time: f32, eye: Vec3) -> Vec<AssetInstance> {
        (0..ASSET_KEYS.len() * 4)
            .map(|i| {
                let angle = i as f32 / (ASSET_KEYS.len() * 4) as f32 * std::f32::consts::TAU;
                let radius = 3.0 + (i % 3) as f32 * 6.0;
                let position = Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
                let model = mat4_from_scale_rotation_translation(
                    Vec3::repeat(1.0),
                    quat_from_rotation_y(time + angle),
                    position,
                );
                AssetInstance::new((i % ASSET_KEYS.len()) as AssetTypeId, model, (position - eye).norm())
            })
            .collect()
    }

    /// Tasks that publish the scene for one frame.
    ///
    /// Geometry, materials and lights never change. They are written by the
    /// first run that succeeds and skipped afterwards.
    pub fn update_graph(&self) -> UpdateGraph<'_> {
        let mut update = UpdateGraph::new();

        update.add_task(
            "static",
            &[
                self.geometry.vertices,
                self.geometry.indices,
                self.materials,
                self.lights,
            ],
            |task| {
                if self.is_published() {
                    return Ok(());
                }
                self.assets.publish_geometry(task.manager(), self.geometry, task.frame())?;
                task.write_pod(self.materials, &MATERIALS)?;
                task.write_pod(self.lights, &self.light_data)?;
                self.published.store(true, Ordering::Release);
                log::debug!("Published static scene data on frame {}", task.frame().frame_index);
                Ok(())
            },
        );
        let camera = update.add_task("camera", &[self.camera], |task| {
            task.write_pod(self.camera, &[self.camera_at(Self::time(task))])
        });
        let instances = update.add_task(
            "instances",
            &[self.batch.commands, self.batch.instances, self.matrices],
            |task| self.write_instances(task),
        );
        update.add_dependency(instances, camera);
        update
    }

    fn time(task: &TaskContext<'_>) -> f32 {
        task.frame().frame_index as f32 / 60.0
    }

    fn write_instances(&self, task: &TaskContext<'_>) -> GraphicsResult<()> {
        let time = Self::time(task);
        let (eye, view, projection) = self.camera_matrices(time);
        let instances = self.instances_at(time, eye);

        let batch = self.assets.build_indirect_commands(&instances)?;
        task.write_pod(self.batch.commands, &batch.commands)?;
        task.write_pod(self.batch.instances, &batch.instances)?;

        let view_projection = projection * view;
        let matrices: Vec<InstanceMatrices> = instances
            .iter()
            .map(|instance| InstanceMatrices {
                model: mat4_to_cols_array_2d(&instance.transform),
                mvp: mat4_to_cols_array_2d(&(view_projection * instance.transform)),
            })
            .collect();
        task.write_pod(self.matrices, &matrices)?;

        log::trace!(
            "Frame {}: {} instances in {} draws",
            task.frame().frame_index,
            batch.instances.len(),
            batch.draw_count()
        );
        Ok(())
    }
}
