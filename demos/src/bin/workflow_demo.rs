//! # Workflow Demo
//!
//! Drives the frame renderer through the dummy backend: five assets drawn by
//! one `Ortho3D` operation over three swapchain images.
//!
//! Usage: `workflow_demo [FRAMES] [CONFIG.ron]`

use std::sync::Arc;

use kestrel_demos::{DemoScene, build_ortho_workflow};
use kestrel_graphics::{DummyBackend, Extent3d, FrameRenderer, GraphicsResult, RendererConfig};

const DEFAULT_FRAMES: u64 = 12;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    kestrel_graphics::init();

    if let Err(err) = run() {
        log::error!("Demo failed ({:?}): {}", err.category(), err);
        std::process::exit(1);
    }
}

fn run() -> GraphicsResult<()> {
    let mut args = std::env::args().skip(1);
    let frames = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);
    let config = match args.next() {
        Some(path) => RendererConfig::load(&path)?,
        None => RendererConfig::default(),
    };

    let extent = Extent3d::new_2d(900, 900);
    let backend = DummyBackend::new(config.image_count, extent);
    log::info!("Using {}", backend.name());

    let mut renderer =
        FrameRenderer::new(config, Arc::new(backend.clone()), Arc::new(backend.clone()))?;
    let mut workflow = renderer.new_workflow("viewer_workflow");
    build_ortho_workflow(&mut workflow)?;
    workflow.compile()?;
    renderer.activate_workflow(&mut workflow)?;

    let aspect = extent.width as f32 / extent.height as f32;
    let scene = DemoScene::new(&backend, renderer.manager(), aspect)?;
    let update = scene.update_graph();

    for _ in 0..frames {
        let Some(frame) = renderer.begin_frame()? else {
            continue;
        };
        if let Err(err) = renderer.run_update(&update, &frame) {
            log::warn!("Dropping {}: {}", frame, err);
            renderer.drop_frame(frame)?;
            continue;
        }
        renderer.end_frame(frame)?;
    }
    renderer.wait_idle();

    let stats = renderer.stats();
    log::info!(
        "Presented {} frames ({} skipped, {} dropped), {} submissions",
        stats.presented,
        stats.skipped,
        stats.dropped,
        backend.submissions().len()
    );
    Ok(())
}
