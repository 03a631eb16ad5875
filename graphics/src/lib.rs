//! # Kestrel Graphics
//!
//! Frame-synchronized renderer core: keeps several in-flight frames
//! consistent while GPU data is updated on the CPU timeline.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ResourceManager`] - Logical resources replicated per device, surface or image
//! - [`AssetAggregator`] - Shared geometry storage, LOD selection and indirect draws
//! - [`WorkflowGraph`] - Declarative render operations and attachments
//! - [`compiler`] - Validation, ordering, queue assignment and barriers
//! - [`RenderWorkflow`] - `Building → Validated → Compiled → Active` lifecycle
//! - [`UpdateGraph`] - Parallel CPU update tasks
//! - [`FrameRenderer`] - `begin_frame` / `end_frame` entry points
//! - [`DummyBackend`] - Presentation, submission and geometry without a GPU
//!
//! ## Example
//!
//! ```ignore
//! use kestrel_graphics::{DummyBackend, FrameRenderer, RendererConfig};
//!
//! let backend = DummyBackend::new(3, Extent3d::new_2d(1280, 720));
//! let mut renderer = FrameRenderer::new(
//!     RendererConfig::default(),
//!     Arc::new(backend.clone()),
//!     Arc::new(backend),
//! )?;
//! if let Some(frame) = renderer.begin_frame()? {
//!     renderer.end_frame(frame)?;
//! }
//! ```

pub mod assets;
pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod frame;
pub mod graph;
pub mod present;
pub mod renderer;
pub mod resources;
pub mod scheduler;
pub mod types;
pub mod update;
pub mod workflow;

// Re-export main types for convenience
pub use assets::{
    AssetAggregator, AssetInstance, AssetTypeId, BatchTargets, GeometryHandle, GeometryLoader,
    GeometryTargets, IndirectBatch, InstanceData,
};
pub use backend::DummyBackend;
pub use compiler::{Barrier, CompiledSchedule, Hazard, ScheduledOperation, compile};
pub use config::RendererConfig;
pub use error::{
    AssetError, ConfigError, ErrorCategory, GraphValidationError, GraphicsError, GraphicsResult,
    PresentError, ResourceError, UpdateError, WorkflowError,
};
pub use frame::{FrameClock, FrameContext, FramePipeline};
pub use graph::{
    AttachmentBinding, AttachmentSize, AttachmentType, LoadOp, OperationKind, QueueCapabilities,
    QueueTraits, RenderOperation, ResourceType, StoreOp, WorkflowGraph,
};
pub use present::PresentationEngine;
pub use renderer::{FrameRenderer, FrameStats};
pub use resources::{
    ExternalSync, LogicalResourceId, PhysicalCopyHandle, ReplicationPolicy, ResourceDescriptor,
    ResourceKind, ResourceManager,
};
pub use scheduler::{Fence, QueueSubmitter, SubmitBatch};
pub use types::{
    BufferUsage, ClearValue, DrawIndexedIndirectArgs, Extent3d, ImageDescriptor, ImageLayout,
    TextureFormat, TextureUsage,
};
pub use update::{TaskContext, UpdateGraph};
pub use workflow::{RenderWorkflow, SurfaceBinding, WorkflowState};

pub use kestrel_core::mesh::{CpuGeometry, VertexLayout};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Logs the library versions. Call once after installing a logger.
pub fn init() {
    kestrel_core::init();
    log::info!("Kestrel Graphics v{} initialized", VERSION);
}

static_assertions::assert_impl_all!(CompiledSchedule: Send, Sync);
static_assertions::assert_impl_all!(DummyBackend: Send, Sync, Clone);
