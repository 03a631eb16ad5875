//! Frame renderer integration tests.
//!
//! Full frames through the dummy backend: update tasks, asset batching,
//! schedule submission and presentation.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::{ortho_workflow, renderer};
use kestrel_core::math::{Aabb, Vec3, mat4_from_translation};
use kestrel_graphics::{
    AssetAggregator, AssetInstance, AttachmentBinding, BatchTargets, ErrorCategory, Extent3d,
    FrameContext, GraphicsError, PresentError, QueueTraits, RenderOperation, RendererConfig,
    ReplicationPolicy, ResourceDescriptor, UpdateError, UpdateGraph, VertexLayout,
};

const CONFIG: &str = r#"
(
    image_count: 3,
    acquire_timeout_ms: 5,
    fence_timeout_ms: 50,
    max_consecutive_acquire_timeouts: 2,
    queues: [
        (capabilities: "GRAPHICS | COMPUTE | TRANSFER", priority: 1.0),
    ],
)
"#;

// ============================================================================
// End-to-End Frames
// ============================================================================

#[test]
fn test_frames_with_updates_and_assets() {
    let (mut renderer, backend) = renderer(RendererConfig::default());
    let mut workflow = renderer.new_workflow("ortho");
    ortho_workflow(&mut workflow);
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();

    let mut assets = AssetAggregator::new(VertexLayout::position_normal());
    for (id, key) in ["triangle", "pentagon", "cube"].into_iter().enumerate() {
        let geometry = assets.load_geometry(&backend, key).unwrap();
        assets
            .register_asset_type(id as u32, Aabb::from_corners([-0.5; 3], [0.5; 3]))
            .unwrap();
        assets.register_lod(id as u32, 0.0, geometry).unwrap();
    }

    let manager = renderer.manager();
    let camera = manager
        .declare("camera", ResourceDescriptor::uniform(64), ReplicationPolicy::PerImage)
        .unwrap();
    let targets = BatchTargets {
        commands: manager
            .declare("drawCommands", ResourceDescriptor::indirect(60), ReplicationPolicy::PerImage)
            .unwrap(),
        instances: manager
            .declare("instances", ResourceDescriptor::storage(192), ReplicationPolicy::PerImage)
            .unwrap(),
    };

    let updates = AtomicU64::new(0);
    let mut update = UpdateGraph::new();
    update.add_task("camera", &[camera], |task| {
        let frame = task.frame().frame_index as f32;
        task.write_pod(camera, &[frame; 16])
    });
    update.add_task(
        "instances",
        &[targets.commands, targets.instances],
        |task| {
            let offset = task.frame().frame_index as f32;
            let instances: Vec<_> = (0..3u32)
                .map(|asset| {
                    let transform = mat4_from_translation(Vec3::new(asset as f32 + offset, 0.0, 0.0));
                    AssetInstance::new(asset, transform, 1.0)
                })
                .collect();
            let batch = assets.build_indirect_commands(&instances)?;
            task.write_pod(targets.commands, &batch.commands)?;
            task.write_pod(targets.instances, &batch.instances)?;
            updates.fetch_add(1, Ordering::Relaxed);
            Ok(())
        },
    );

    let mut frames = Vec::new();
    for _ in 0..6 {
        let frame = renderer.begin_frame().unwrap().unwrap();
        renderer.run_update(&update, &frame).unwrap();
        renderer.end_frame(frame).unwrap();
        frames.push(frame);
    }

    assert_eq!(updates.load(Ordering::Relaxed), 6);
    assert_eq!(backend.presented(), vec![0, 1, 2, 0, 1, 2]);
    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 6);
    for (frame, record) in frames.iter().zip(&submissions) {
        assert_eq!(record.frame_index, frame.frame_index);
        assert_eq!(record.image_index, frame.image_index);
        assert_eq!(record.operations, vec!["Ortho3D".to_string()]);
        assert!(record.wait.is_empty());
    }

    // Image slot 2 holds frame 5's instances, slot 0 frame 3's.
    let manager = renderer.manager();
    let read_first_x = |frame: &FrameContext| {
        let bytes = manager
            .read(manager.resolve(targets.instances, frame).unwrap())
            .unwrap();
        let floats: &[f32] = bytemuck::cast_slice(&bytes);
        floats[12]
    };
    assert_eq!(read_first_x(&frames[5]), 5.0);
    assert_eq!(read_first_x(&frames[3]), 3.0);

    // One surface, so the camera has a single copy holding the last write.
    let bytes = manager.read(manager.resolve(camera, &frames[0]).unwrap()).unwrap();
    assert_eq!(bytemuck::cast_slice::<u8, f32>(&bytes)[0], 5.0);
}

#[test]
fn test_frames_without_schedule_only_present() {
    let (mut renderer, backend) = renderer(RendererConfig::default());
    for _ in 0..4 {
        let frame = renderer.begin_frame().unwrap().unwrap();
        renderer.end_frame(frame).unwrap();
    }
    assert!(backend.submissions().is_empty());
    assert_eq!(backend.presented(), vec![0, 1, 2, 0]);
}

#[test]
fn test_multi_queue_batches_are_chained() {
    let config = RendererConfig::default()
        .with_queues(vec![QueueTraits::graphics(1.0), QueueTraits::graphics(1.0)]);
    let (mut renderer, backend) = renderer(config);

    let mut workflow = renderer.new_workflow("ortho");
    ortho_workflow(&mut workflow);
    workflow
        .add_render_operation(RenderOperation::graphics("Overlay"))
        .unwrap();
    workflow
        .add_attachment_input(AttachmentBinding::image("Overlay", "depthBuffer", "depthOutput"))
        .unwrap();
    workflow
        .add_attachment_output(AttachmentBinding::color("Overlay", "surface", "colorOutput"))
        .unwrap();
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();

    let frame = renderer.begin_frame().unwrap().unwrap();
    renderer.end_frame(frame).unwrap();

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_ne!(submissions[0].queue, submissions[1].queue);
    assert_eq!(submissions[1].wait, vec![submissions[0].signal]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_failed_update_drops_frame() {
    let (mut renderer, backend) = renderer(RendererConfig::default());
    let manager = renderer.manager();
    let camera = manager
        .declare("camera", ResourceDescriptor::uniform(64), ReplicationPolicy::PerImage)
        .unwrap();
    let lights = manager
        .declare("lights", ResourceDescriptor::uniform(64), ReplicationPolicy::PerImage)
        .unwrap();

    let mut update = UpdateGraph::new();
    update.add_task("camera", &[camera], move |task| task.write(lights, b"oops"));

    let frame = renderer.begin_frame().unwrap().unwrap();
    let err = renderer.run_update(&update, &frame).unwrap_err();
    assert!(matches!(
        err,
        GraphicsError::Update(UpdateError::UndeclaredWrite { ref task, ref resource })
            if task == "camera" && resource == "lights"
    ));
    renderer.drop_frame(frame).unwrap();

    let next = renderer.begin_frame().unwrap().unwrap();
    assert_eq!(next.frame_index, frame.frame_index + 1);
    renderer.end_frame(next).unwrap();
    assert_eq!(backend.presented(), vec![next.image_index]);
    assert_eq!(renderer.stats().dropped, 1);
}

#[test]
fn test_config_from_ron_drives_timeouts() {
    let config = RendererConfig::from_ron_str(CONFIG).unwrap();
    assert_eq!(config.max_consecutive_acquire_timeouts, 2);
    let (mut renderer, backend) = renderer(config);

    backend.fail_next_acquire(PresentError::Timeout { timeout_ms: 5 });
    assert_eq!(renderer.begin_frame().unwrap(), None);

    backend.fail_next_acquire(PresentError::Timeout { timeout_ms: 5 });
    let err = renderer.begin_frame().unwrap_err();
    assert!(matches!(err, GraphicsError::AcquireTimeoutsExceeded { count: 2 }));
    assert_eq!(err.category(), ErrorCategory::Fatal);
}

#[test]
fn test_out_of_date_skip_then_reactivate() {
    let (mut renderer, backend) = renderer(RendererConfig::default());
    let mut workflow = renderer.new_workflow("ortho");
    ortho_workflow(&mut workflow);
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();

    backend.fail_next_acquire(PresentError::OutOfDate);
    assert_eq!(renderer.begin_frame().unwrap(), None);

    backend.set_extent(Extent3d::new_2d(32, 32));
    workflow.rebuild();
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();

    let frame = renderer.begin_frame().unwrap().unwrap();
    renderer.end_frame(frame).unwrap();
    assert_eq!(renderer.stats().skipped, 1);
    assert_eq!(renderer.stats().presented, 1);
}

#[test]
fn test_busy_image_slot_skips_frame_and_keeps_image() {
    let config = RendererConfig::default()
        .with_image_count(2)
        .with_fence_timeout(Duration::from_millis(5));
    let (mut renderer, backend) = renderer(config);
    let mut workflow = renderer.new_workflow("ortho");
    ortho_workflow(&mut workflow);
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();
    backend.set_manual_fences(true);

    for _ in 0..2 {
        let frame = renderer.begin_frame().unwrap().unwrap();
        renderer.end_frame(frame).unwrap();
    }

    // Image 0 is acquired but frame 0 still owns its slot.
    assert_eq!(renderer.begin_frame().unwrap(), None);
    assert_eq!(renderer.stats().skipped, 1);

    backend.complete_all();
    let frame = renderer.begin_frame().unwrap().unwrap();
    assert_eq!(frame.frame_index, 2);
    assert_eq!(frame.image_index, 0);
    renderer.end_frame(frame).unwrap();

    assert_eq!(backend.presented(), vec![0, 1, 0]);
    assert_eq!(renderer.stats().presented, 3);
}

#[test]
fn test_busy_image_slot_escalates_after_limit() {
    let config = RendererConfig::default()
        .with_image_count(1)
        .with_fence_timeout(Duration::from_millis(5))
        .with_max_consecutive_acquire_timeouts(2);
    let (mut renderer, backend) = renderer(config);
    let mut workflow = renderer.new_workflow("ortho");
    ortho_workflow(&mut workflow);
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();
    backend.set_manual_fences(true);

    let frame = renderer.begin_frame().unwrap().unwrap();
    renderer.end_frame(frame).unwrap();

    assert_eq!(renderer.begin_frame().unwrap(), None);
    let err = renderer.begin_frame().unwrap_err();
    assert!(matches!(err, GraphicsError::AcquireTimeoutsExceeded { count: 2 }));
    assert_eq!(err.category(), ErrorCategory::Fatal);
}

#[test]
fn test_wait_idle_with_manual_fences() {
    let (mut renderer, backend) = renderer(RendererConfig::default());
    let mut workflow = renderer.new_workflow("ortho");
    ortho_workflow(&mut workflow);
    workflow.compile().unwrap();
    renderer.activate_workflow(&mut workflow).unwrap();
    backend.set_manual_fences(true);

    for _ in 0..3 {
        let frame = renderer.begin_frame().unwrap().unwrap();
        renderer.end_frame(frame).unwrap();
    }

    let gpu = backend.clone();
    let completer = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        gpu.complete_all();
    });
    renderer.wait_idle();
    completer.join().unwrap();

    // Every slot is free again.
    let frame = renderer.begin_frame().unwrap().unwrap();
    assert_eq!(frame.image_index, 0);
    renderer.drop_frame(frame).unwrap();
}
