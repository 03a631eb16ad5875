//! Dummy GPU backend for testing and development.
//!
//! Performs no GPU work. Submissions are recorded and their fences signaled
//! immediately (or held until [`DummyBackend::complete_all`] when fences are
//! manual), images are handed out round-robin, and geometry comes from the
//! procedural generators in `kestrel-core`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use kestrel_core::mesh::{CpuGeometry, generators};

use crate::assets::GeometryLoader;
use crate::error::PresentError;
use crate::present::PresentationEngine;
use crate::scheduler::{Fence, QueueSubmitter, SubmitBatch};
use crate::types::Extent3d;

/// One batch received by the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// Frame index of the batch.
    pub frame_index: u64,
    /// Image slot of the batch.
    pub image_index: u32,
    /// Queue index.
    pub queue: usize,
    /// Operation names in execution order.
    pub operations: Vec<String>,
    /// Number of barriers recorded, including final barriers.
    pub barrier_count: usize,
    /// Ids of the semaphores waited on.
    pub wait: Vec<u64>,
    /// Id of the semaphore signaled.
    pub signal: u64,
}

#[derive(Debug)]
struct DummyState {
    surface_index: u32,
    image_count: u32,
    extent: Extent3d,
    next_image: u32,
    acquire_failures: VecDeque<PresentError>,
    present_failures: VecDeque<PresentError>,
    presented: Vec<u32>,
    submissions: Vec<SubmissionRecord>,
    manual_fences: bool,
    pending_fences: Vec<Fence>,
}

/// Dummy GPU backend.
///
/// Clones share state, so one instance can serve as presentation engine and
/// queue submitter while a test inspects it.
#[derive(Debug, Clone)]
pub struct DummyBackend {
    state: Arc<Mutex<DummyState>>,
}

impl DummyBackend {
    /// Create a backend presenting `image_count` images of `extent` on
    /// surface 0.
    pub fn new(image_count: u32, extent: Extent3d) -> Self {
        Self {
            state: Arc::new(Mutex::new(DummyState {
                surface_index: 0,
                image_count: image_count.max(1),
                extent,
                next_image: 0,
                acquire_failures: VecDeque::new(),
                present_failures: VecDeque::new(),
                presented: Vec::new(),
                submissions: Vec::new(),
                manual_fences: false,
                pending_fences: Vec::new(),
            })),
        }
    }

    /// Set the surface index reported to frame contexts.
    pub fn with_surface_index(self, surface_index: u32) -> Self {
        self.state.lock().surface_index = surface_index;
        self
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Make the next acquisitions fail with `error`, in call order.
    pub fn fail_next_acquire(&self, error: PresentError) {
        self.state.lock().acquire_failures.push_back(error);
    }

    /// Make the next presentation fail with `error`.
    pub fn fail_next_present(&self, error: PresentError) {
        self.state.lock().present_failures.push_back(error);
    }

    /// Simulate a window resize.
    pub fn set_extent(&self, extent: Extent3d) {
        self.state.lock().extent = extent;
    }

    /// When enabled, fences stay unsignaled until [`complete_all`](Self::complete_all).
    pub fn set_manual_fences(&self, manual: bool) {
        self.state.lock().manual_fences = manual;
    }

    /// Signal every held fence, as if the GPU caught up.
    pub fn complete_all(&self) {
        let fences = std::mem::take(&mut self.state.lock().pending_fences);
        log::trace!("DummyBackend: completing {} batches", fences.len());
        for fence in fences {
            fence.signal();
        }
    }

    /// Images presented so far, in order.
    pub fn presented(&self) -> Vec<u32> {
        self.state.lock().presented.clone()
    }

    /// Batches submitted so far, in order.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state.lock().submissions.clone()
    }
}

impl PresentationEngine for DummyBackend {
    fn surface_index(&self) -> u32 {
        self.state.lock().surface_index
    }

    fn image_count(&self) -> u32 {
        self.state.lock().image_count
    }

    fn extent(&self) -> Extent3d {
        self.state.lock().extent
    }

    fn acquire_image_index(&self, _timeout: Duration) -> Result<u32, PresentError> {
        let mut state = self.state.lock();
        if let Some(error) = state.acquire_failures.pop_front() {
            log::trace!("DummyBackend: acquire failed: {}", error);
            return Err(error);
        }
        let index = state.next_image;
        state.next_image = (index + 1) % state.image_count;
        log::trace!("DummyBackend: acquired image {}", index);
        Ok(index)
    }

    fn present(&self, image_index: u32) -> Result<(), PresentError> {
        let mut state = self.state.lock();
        if let Some(error) = state.present_failures.pop_front() {
            return Err(error);
        }
        log::trace!("DummyBackend: presenting image {}", image_index);
        state.presented.push(image_index);
        Ok(())
    }
}

impl QueueSubmitter for DummyBackend {
    fn submit(&self, batch: &SubmitBatch<'_>) -> Fence {
        log::trace!(
            "DummyBackend: executing batch '{}' on queue {} ({} operations)",
            batch.name,
            batch.queue,
            batch.operations.len()
        );
        for op in batch.operations {
            log::trace!(
                "DummyBackend: {} ({} barriers, pipeline {:?})",
                op.name,
                op.barriers.len(),
                op.pipeline
            );
        }

        let mut state = self.state.lock();
        state.submissions.push(SubmissionRecord {
            frame_index: batch.frame.frame_index,
            image_index: batch.frame.image_index,
            queue: batch.queue,
            operations: batch.operations.iter().map(|op| op.name.clone()).collect(),
            barrier_count: batch.operations.iter().map(|op| op.barriers.len()).sum::<usize>()
                + batch.final_barriers.len(),
            wait: batch.wait.iter().map(|s| s.id()).collect(),
            signal: batch.signal.id(),
        });

        if state.manual_fences {
            let fence = Fence::new_unsignaled();
            state.pending_fences.push(fence.clone());
            fence
        } else {
            Fence::new_signaled()
        }
    }
}

impl GeometryLoader for DummyBackend {
    /// Keys name procedural shapes: `triangle`, `pentagon`, `cube`,
    /// `cylinder`, `sphere` (alias `icosphere`).
    fn load(&self, key: &str) -> Result<CpuGeometry, String> {
        let geometry = match key {
            "triangle" => generators::generate_triangle(1.0),
            "pentagon" => generators::generate_pentagon(0.5),
            "cube" => generators::generate_cube(0.5),
            "cylinder" => generators::generate_cylinder(0.5, 1.0, 16),
            "sphere" | "icosphere" => generators::generate_sphere(0.5, 16, 8),
            _ => return Err(format!("no procedural geometry named '{key}'")),
        };
        log::trace!(
            "DummyBackend: generated '{}' ({} vertices)",
            key,
            geometry.vertex_count()
        );
        Ok(geometry)
    }
}
