//! Common utilities for integration tests.
//!
//! Every test drives the renderer through the [`DummyBackend`], which records
//! submissions and presentations instead of touching a GPU.

#![allow(dead_code)]

use std::sync::Arc;

use kestrel_graphics::{
    AttachmentBinding, AttachmentSize, AttachmentType, DummyBackend, Extent3d, FrameContext,
    FrameRenderer, LoadOp, RenderOperation, RenderWorkflow, RendererConfig, ResourceType,
    TextureFormat,
};

/// Default surface size used by the tests.
pub const SURFACE: Extent3d = Extent3d {
    width: 64,
    height: 48,
    depth: 1,
};

/// Install a test logger once. Honors `RUST_LOG`.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A renderer over a dummy backend with `image_count` images.
pub fn renderer(config: RendererConfig) -> (FrameRenderer, DummyBackend) {
    init_logger();
    let backend = DummyBackend::new(config.image_count, SURFACE);
    let renderer = FrameRenderer::new(config, Arc::new(backend.clone()), Arc::new(backend.clone()))
        .expect("valid renderer config");
    (renderer, backend)
}

/// Frame context on device 0, surface 0.
pub fn ctx(frame_index: u64, image_index: u32) -> FrameContext {
    FrameContext::new(frame_index, image_index)
}

/// The single-pass workflow of the demo: `Ortho3D` clears and writes a
/// surface-sized depth buffer and the surface.
pub fn ortho_workflow(workflow: &mut RenderWorkflow) {
    workflow
        .add_resource_type(ResourceType::new(
            "depthBuffer",
            AttachmentType::Depth,
            TextureFormat::Depth32Float,
            AttachmentSize::surface(),
        ))
        .expect("building");
    workflow
        .add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm))
        .expect("building");
    let op = workflow
        .add_render_operation(RenderOperation::graphics("Ortho3D"))
        .expect("building");
    workflow
        .set_operation_pipeline(op, "ortho3d")
        .expect("building");
    workflow
        .add_attachment_output(
            AttachmentBinding::depth("Ortho3D", "depthBuffer", "depthOutput")
                .with_load_op(LoadOp::clear_depth(1.0)),
        )
        .expect("building");
    workflow
        .add_attachment_output(
            AttachmentBinding::color("Ortho3D", "surface", "colorOutput")
                .with_load_op(LoadOp::clear_color(0.0, 0.0, 0.0, 0.0)),
        )
        .expect("building");
}
