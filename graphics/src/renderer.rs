//! Host-facing frame loop.
//!
//! ```ignore
//! let mut renderer = FrameRenderer::new(config, backend.clone(), backend.clone())?;
//! let mut workflow = renderer.new_workflow("main");
//! // ... declare resource types, operations and bindings ...
//! workflow.compile()?;
//! renderer.activate_workflow(&mut workflow)?;
//!
//! loop {
//!     let Some(frame) = renderer.begin_frame()? else {
//!         continue; // image not available in time, frame skipped
//!     };
//!     renderer.run_update(&update, &frame)?;
//!     renderer.end_frame(frame)?;
//! }
//! renderer.wait_idle();
//! ```
//!
//! # Frame sequence
//!
//! 1. `begin_frame` acquires an image (bounded), waits for the GPU to
//!    release that image slot (bounded), ticks the clock and collects retired
//!    resource copies. An image whose slot is still busy is kept and retried
//!    by the next `begin_frame`.
//! 2. The host writes resources for the returned [`FrameContext`], usually
//!    through an [`UpdateGraph`].
//! 3. `end_frame` submits the active schedule, stores the frame fence in the
//!    image slot and presents. `drop_frame` abandons the frame instead.

use std::sync::Arc;

use crate::compiler::CompiledSchedule;
use crate::config::RendererConfig;
use crate::error::{ConfigError, GraphicsError, GraphicsResult, PresentError};
use crate::frame::{FrameClock, FrameContext, FramePipeline};
use crate::present::PresentationEngine;
use crate::resources::ResourceManager;
use crate::scheduler::{FrameSchedule, QueueSubmitter};
use crate::update::UpdateGraph;
use crate::workflow::RenderWorkflow;

/// Frame counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Frames submitted and presented.
    pub presented: u64,
    /// Frames skipped because no image was acquired in time.
    pub skipped: u64,
    /// Frames abandoned with [`FrameRenderer::drop_frame`].
    pub dropped: u64,
}

/// Drives frames from image acquisition to presentation.
pub struct FrameRenderer {
    config: RendererConfig,
    presentation: Arc<dyn PresentationEngine>,
    submitter: Arc<dyn QueueSubmitter>,
    manager: ResourceManager,
    clock: FrameClock,
    pipeline: FramePipeline,
    schedule: Option<Arc<CompiledSchedule>>,
    pending: Option<FrameContext>,
    /// Acquired image whose slot was still busy, retried before acquiring.
    held_image: Option<u32>,
    consecutive_timeouts: u32,
    stats: FrameStats,
}

impl FrameRenderer {
    /// Create a renderer.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration is out of range or the
    /// presentation engine's image count differs from `config.image_count`.
    pub fn new(
        config: RendererConfig,
        presentation: Arc<dyn PresentationEngine>,
        submitter: Arc<dyn QueueSubmitter>,
    ) -> GraphicsResult<Self> {
        config.validate()?;
        if presentation.image_count() != config.image_count {
            return Err(ConfigError::Invalid(format!(
                "presentation engine has {} images, config expects {}",
                presentation.image_count(),
                config.image_count
            ))
            .into());
        }

        log::info!(
            "Frame renderer: {} images, {} queues, {} device(s), {} surface(s)",
            config.image_count,
            config.queues.len(),
            config.device_count,
            config.surface_count
        );
        Ok(Self {
            manager: ResourceManager::new(config.replication_counts(), config.max_resource_capacity),
            clock: FrameClock::new(),
            pipeline: FramePipeline::new(config.image_count),
            config,
            presentation,
            submitter,
            schedule: None,
            pending: None,
            held_image: None,
            consecutive_timeouts: 0,
            stats: FrameStats::default(),
        })
    }

    /// Renderer configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Replicated resource manager shared by every frame.
    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    /// Frame counters.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Frame between `begin_frame` and `end_frame`/`drop_frame`, if any.
    pub fn pending_frame(&self) -> Option<FrameContext> {
        self.pending
    }

    /// Schedule submitted by `end_frame`.
    pub fn active_schedule(&self) -> Option<&Arc<CompiledSchedule>> {
        self.schedule.as_ref()
    }

    /// A new workflow compiled for the configured queues.
    pub fn new_workflow(&self, name: impl Into<String>) -> RenderWorkflow {
        RenderWorkflow::new(name, self.config.queues.clone())
    }

    /// Activate a compiled workflow on the presentation surface and submit
    /// it from the next `end_frame` on.
    ///
    /// Call again after a resize: framebuffer resources are resized and the
    /// old copies retire once in-flight frames are done with them.
    pub fn activate_workflow(
        &mut self,
        workflow: &mut RenderWorkflow,
    ) -> GraphicsResult<Arc<CompiledSchedule>> {
        let surface = self.presentation.surface_binding();
        let frame_index = self.clock.current_frame().unwrap_or(0);
        let schedule = workflow.activate(surface, &self.manager, frame_index)?;
        self.schedule = Some(Arc::clone(&schedule));
        Ok(schedule)
    }

    /// Start a frame.
    ///
    /// Returns `Ok(None)` when the frame is skipped: the image was not
    /// acquired within the configured timeout, the surface is out of date, or
    /// the GPU did not release the acquired image slot within the fence
    /// timeout. In the last case the image stays acquired and the next call
    /// retries it instead of acquiring another.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::FrameInProgress`] if the previous frame is pending.
    /// - [`GraphicsError::AcquireTimeoutsExceeded`] after too many
    ///   consecutive timed-out frames.
    /// - [`PresentError::SurfaceLost`].
    pub fn begin_frame(&mut self) -> GraphicsResult<Option<FrameContext>> {
        if let Some(pending) = self.pending {
            return Err(GraphicsError::FrameInProgress(pending.frame_index));
        }

        let image_index = match self.held_image.take() {
            Some(index) => index,
            None => match self
                .presentation
                .acquire_image_index(self.config.acquire_timeout())
            {
                Ok(index) => index,
                Err(PresentError::Timeout { timeout_ms }) => {
                    log::warn!("Skipping frame: no image acquired within {} ms", timeout_ms);
                    return self.skip_timed_out_frame();
                }
                Err(PresentError::OutOfDate) => {
                    self.stats.skipped += 1;
                    log::warn!("Skipping frame: surface out of date");
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            },
        };

        if !self
            .pipeline
            .wait_for_slot(image_index, self.config.fence_timeout())
        {
            log::warn!(
                "Skipping frame: image slot {} still in use by the GPU after {} ms",
                image_index,
                self.config.fence_timeout_ms
            );
            self.held_image = Some(image_index);
            return self.skip_timed_out_frame();
        }
        self.consecutive_timeouts = 0;

        let frame_index = self.clock.tick();
        let retired = self.manager.collect_retired(frame_index);
        if retired > 0 {
            log::debug!("Freed {} retired copies at frame {}", retired, frame_index);
        }

        let frame = FrameContext::new(frame_index, image_index)
            .with_surface(self.presentation.surface_index());
        log::trace!("Begin {}", frame);
        self.pending = Some(frame);
        Ok(Some(frame))
    }

    /// Run update tasks for the pending frame.
    pub fn run_update(&self, update: &UpdateGraph<'_>, frame: &FrameContext) -> GraphicsResult<()> {
        self.check_pending(frame)?;
        update.run(frame, &self.manager)?;
        Ok(())
    }

    /// Submit the active schedule for `frame` and present its image.
    ///
    /// Without an active schedule nothing is submitted and the image is
    /// presented as is.
    pub fn end_frame(&mut self, frame: FrameContext) -> GraphicsResult<()> {
        self.check_pending(&frame)?;
        self.pending = None;

        let mut schedule = FrameSchedule::new(frame);
        if let Some(compiled) = &self.schedule {
            schedule.submit_schedule(self.submitter.as_ref(), compiled);
        }
        if let Some(fence) = schedule.take_fence() {
            self.pipeline.store_fence(frame.image_index, fence);
        }

        self.presentation.present(frame.image_index)?;
        self.stats.presented += 1;
        log::trace!("End {} ({} batches)", frame, schedule.submitted_count());
        Ok(())
    }

    /// Abandon the pending frame without submitting or presenting it.
    ///
    /// Resource writes already made for the frame stay in their per-image
    /// copies and are overwritten when the slot comes around again.
    pub fn drop_frame(&mut self, frame: FrameContext) -> GraphicsResult<()> {
        self.check_pending(&frame)?;
        self.pending = None;
        self.stats.dropped += 1;
        log::debug!("Dropped {}", frame);
        Ok(())
    }

    /// Block until the GPU finished every submitted frame.
    pub fn wait_idle(&self) {
        self.pipeline.wait_idle();
    }

    fn skip_timed_out_frame(&mut self) -> GraphicsResult<Option<FrameContext>> {
        self.consecutive_timeouts += 1;
        self.stats.skipped += 1;
        if self.consecutive_timeouts >= self.config.max_consecutive_acquire_timeouts {
            log::error!("Frames timed out {} consecutive times", self.consecutive_timeouts);
            return Err(GraphicsError::AcquireTimeoutsExceeded {
                count: self.consecutive_timeouts,
            });
        }
        Ok(None)
    }

    fn check_pending(&self, frame: &FrameContext) -> GraphicsResult<()> {
        match self.pending {
            Some(pending) if pending == *frame => Ok(()),
            pending => Err(GraphicsError::FrameMismatch {
                expected: pending.map(|p| p.frame_index),
                got: frame.frame_index,
            }),
        }
    }
}

impl std::fmt::Debug for FrameRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRenderer")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("pending", &self.pending)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
