//! Asset/LOD aggregator integration tests.

mod common;

use rstest::rstest;

use common::{ctx, init_logger};
use kestrel_core::math::{Aabb, Mat4, Vec3, mat4_from_translation};
use kestrel_core::mesh::generators;
use kestrel_graphics::resources::ReplicationCounts;
use kestrel_graphics::{
    AssetAggregator, AssetError, AssetInstance, BatchTargets, DrawIndexedIndirectArgs,
    DummyBackend, Extent3d, GeometryTargets, InstanceData, ReplicationPolicy, ResourceDescriptor,
    ResourceKind, ResourceManager, VertexLayout,
};

fn aggregator() -> AssetAggregator {
    init_logger();
    AssetAggregator::new(VertexLayout::position_normal())
}

fn unit_box() -> Aabb {
    Aabb::from_corners([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0])
}

/// Asset 1 with a fine sphere at threshold 0 and a coarse cube at 50.
fn two_lod_aggregator() -> (AssetAggregator, [kestrel_graphics::GeometryHandle; 2]) {
    let mut agg = aggregator();
    let fine = agg.add_geometry(generators::generate_sphere(1.0, 16, 8)).unwrap();
    let coarse = agg.add_geometry(generators::generate_cube(1.0)).unwrap();
    agg.register_asset_type(1, unit_box()).unwrap();
    agg.register_lod(1, 0.0, fine).unwrap();
    agg.register_lod(1, 50.0, coarse).unwrap();
    (agg, [fine, coarse])
}

// ============================================================================
// End-to-End Scenario
// ============================================================================

#[rstest]
#[case::near(10.0, 0)]
#[case::far(60.0, 1)]
fn test_two_lod_selection_scenario(#[case] distance: f32, #[case] expected_lod: usize) {
    let (agg, geometries) = two_lod_aggregator();
    let batch = agg
        .build_indirect_commands(&[AssetInstance::new(1, Mat4::identity(), distance)])
        .unwrap();

    assert_eq!(batch.draw_count(), 1);
    assert_eq!(batch.groups[0].lod as usize, expected_lod);
    assert_eq!(batch.groups[0].geometry, geometries[expected_lod]);

    let range = agg.geometry(geometries[expected_lod]).unwrap();
    assert_eq!(
        batch.commands[0],
        DrawIndexedIndirectArgs::new(range.index_count, 1)
            .with_first_index(range.first_index)
            .with_base_vertex(range.vertex_offset as i32)
            .with_first_instance(0)
    );
}

// ============================================================================
// LOD Selection
// ============================================================================

#[rstest]
#[case::at_zero(0.0, 0)]
#[case::just_below(49.99, 0)]
#[case::at_threshold(50.0, 1)]
#[case::beyond(1.0e6, 1)]
fn test_threshold_boundaries(#[case] distance: f32, #[case] expected_lod: usize) {
    let (agg, _) = two_lod_aggregator();
    assert_eq!(agg.asset_type(1).unwrap().select_lod(distance), Some(expected_lod));
}

#[test]
fn test_finest_variant_is_the_fallback() {
    let mut agg = aggregator();
    let geometry = agg.add_geometry(generators::generate_triangle(1.0)).unwrap();
    agg.register_asset_type(0, unit_box()).unwrap();
    agg.register_lod(0, 20.0, geometry).unwrap();
    assert_eq!(agg.asset_type(0).unwrap().select_lod(5.0), Some(0));
}

/// Adding a finer variant never changes the selection for distances beyond
/// every existing threshold.
#[rstest]
#[case(vec![10.0, 40.0], 3.0)]
#[case(vec![25.0], 0.0)]
#[case(vec![5.0, 15.0, 45.0], 1.0)]
fn test_finer_lod_keeps_far_selection(#[case] thresholds: Vec<f32>, #[case] finer: f32) {
    let mut agg = aggregator();
    agg.register_asset_type(2, unit_box()).unwrap();
    for &threshold in &thresholds {
        let g = agg.add_geometry(generators::generate_cube(0.5)).unwrap();
        agg.register_lod(2, threshold, g).unwrap();
    }
    let far = thresholds.iter().cloned().fold(0.0f32, f32::max) + 1.0;
    let before = {
        let t = agg.asset_type(2).unwrap();
        t.lods[t.select_lod(far).unwrap()].geometry
    };

    let g = agg.add_geometry(generators::generate_triangle(0.5)).unwrap();
    agg.register_lod(2, finer, g).unwrap();

    let t = agg.asset_type(2).unwrap();
    assert_eq!(t.lods[t.select_lod(far).unwrap()].geometry, before);
}

// ============================================================================
// Grouping and Bounds
// ============================================================================

#[test]
fn test_groups_are_contiguous_and_ordered() {
    let mut agg = aggregator();
    let shapes = [
        generators::generate_triangle(1.0),
        generators::generate_cube(0.5),
        generators::generate_cylinder(0.5, 1.0, 8),
        generators::generate_sphere(0.5, 8, 4),
        generators::generate_pentagon(0.5),
    ];
    for (id, shape) in shapes.into_iter().enumerate() {
        let g = agg.add_geometry(shape).unwrap();
        agg.register_asset_type(id as u32, unit_box()).unwrap();
        agg.register_lod(id as u32, 0.0, g).unwrap();
    }

    let at = |x: f32| mat4_from_translation(Vec3::new(x, 0.0, 0.0));
    let instances = [
        AssetInstance::new(4, at(0.0), 1.0),
        AssetInstance::new(1, at(1.0), 1.0),
        AssetInstance::new(4, at(2.0), 1.0),
        AssetInstance::new(0, at(3.0), 1.0),
        AssetInstance::new(1, at(4.0), 1.0),
    ];
    let batch = agg.build_indirect_commands(&instances).unwrap();

    let assets: Vec<u32> = batch.groups.iter().map(|g| g.asset).collect();
    assert_eq!(assets, vec![0, 1, 4]);
    let ranges: Vec<(u32, u32)> = batch
        .commands
        .iter()
        .map(|c| (c.first_instance, c.instance_count))
        .collect();
    assert_eq!(ranges, vec![(0, 1), (1, 2), (3, 2)]);

    // Instance order within a group follows the input.
    assert_eq!(batch.instances[1], InstanceData::from_transform(&at(1.0)));
    assert_eq!(batch.instances[2], InstanceData::from_transform(&at(4.0)));
    assert_eq!(batch.instances.len(), 5);
}

#[test]
fn test_bounds_cover_declared_volume_and_lods() {
    let mut agg = aggregator();
    let big = agg.add_geometry(generators::generate_cube(3.0)).unwrap();
    agg.register_asset_type(0, unit_box()).unwrap();
    agg.register_lod(0, 0.0, big).unwrap();

    let bounds = agg.asset_type(0).unwrap().bounds;
    assert!(bounds.contains(&unit_box()));
    assert!(bounds.contains(&agg.geometry(big).unwrap().extents));
    assert_eq!(agg.asset_type(0).unwrap().declared_bounds, unit_box());
}

#[test]
fn test_errors_name_the_asset() {
    let mut agg = aggregator();
    agg.register_asset_type(3, unit_box()).unwrap();
    assert_eq!(
        agg.register_asset_type(3, unit_box()),
        Err(AssetError::DuplicateAssetId(3))
    );
    assert_eq!(
        agg.build_indirect_commands(&[AssetInstance::new(3, Mat4::identity(), 1.0)]),
        Err(AssetError::NoLevelOfDetail(3))
    );
    assert_eq!(
        agg.build_indirect_commands(&[AssetInstance::new(9, Mat4::identity(), 1.0)]),
        Err(AssetError::UnknownAssetId(9))
    );
}

// ============================================================================
// Loading and Publishing
// ============================================================================

#[test]
fn test_load_geometry_from_loader() {
    let mut agg = aggregator();
    let backend = DummyBackend::new(3, Extent3d::new_2d(8, 8));
    let cube = agg.load_geometry(&backend, "cube").unwrap();
    assert_eq!(agg.geometry(cube).unwrap().index_count, 36);
    assert!(matches!(
        agg.load_geometry(&backend, "teapot"),
        Err(AssetError::LoadFailed { ref key, .. }) if key == "teapot"
    ));
}

#[test]
fn test_publish_into_per_image_resources() {
    let (agg, _) = two_lod_aggregator();
    let manager = ResourceManager::new(ReplicationCounts::with_images(3), 1 << 20);
    let targets = BatchTargets {
        commands: manager
            .declare("drawCommands", ResourceDescriptor::indirect(64), ReplicationPolicy::PerImage)
            .unwrap(),
        instances: manager
            .declare("instances", ResourceDescriptor::storage(64), ReplicationPolicy::PerImage)
            .unwrap(),
    };
    let geometry = GeometryTargets {
        vertices: manager
            .declare(
                "vertices",
                ResourceDescriptor::buffer(ResourceKind::Vertex, 1024),
                ReplicationPolicy::Single,
            )
            .unwrap(),
        indices: manager
            .declare(
                "indices",
                ResourceDescriptor::buffer(ResourceKind::Index, 1024),
                ReplicationPolicy::Single,
            )
            .unwrap(),
    };
    agg.publish_geometry(&manager, geometry, &ctx(0, 0)).unwrap();

    for (frame, count) in [(0u64, 1usize), (1, 3)] {
        let instances: Vec<_> = (0..count)
            .map(|i| AssetInstance::new(1, Mat4::identity(), 30.0 * i as f32))
            .collect();
        let batch = agg.build_indirect_commands(&instances).unwrap();
        let frame_ctx = ctx(frame, frame as u32);
        agg.publish(&batch, &manager, targets, &frame_ctx).unwrap();

        let bytes = manager
            .read(manager.resolve(targets.commands, &frame_ctx).unwrap())
            .unwrap();
        assert_eq!(bytes, batch.command_bytes());
        let instance_bytes = manager
            .read(manager.resolve(targets.instances, &frame_ctx).unwrap())
            .unwrap();
        assert_eq!(instance_bytes.len(), count * 64);
    }

    // Frame 0's copy is untouched by frame 1.
    let first = manager
        .read(manager.resolve(targets.instances, &ctx(0, 0)).unwrap())
        .unwrap();
    assert_eq!(first.len(), 64);

    let vertices = manager
        .read(manager.resolve(geometry.vertices, &ctx(2, 2)).unwrap())
        .unwrap();
    assert_eq!(vertices, agg.vertex_bytes());
}
