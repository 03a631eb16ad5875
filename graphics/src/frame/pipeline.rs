use std::time::Duration;

use crate::scheduler::Fence;

/// Tracks the GPU fence of the last frame submitted in each image slot.
///
/// With `image_count` slots the CPU can run ahead of the GPU by that many
/// frames. Before frame *k* writes per-image copies for slot *i*, the
/// renderer waits on the fence of frame *k - image_count*, the previous user
/// of slot *i*:
///
/// ```text
/// image_count = 3
///
/// slot 0: [frame 0] ──wait──► [frame 3] ──wait──► [frame 6]
/// slot 1: [frame 1] ──wait──► [frame 4] ──wait──► ...
/// slot 2: [frame 2] ──wait──► [frame 5] ──wait──► ...
/// ```
///
/// Slots are addressed by the image index the presentation engine returns,
/// not by a rotating counter, so out-of-order acquisition is handled.
#[derive(Debug)]
pub struct FramePipeline {
    fences: Vec<Option<Fence>>,
}

impl FramePipeline {
    /// Create a pipeline with `image_count` slots.
    ///
    /// # Panics
    ///
    /// Panics if `image_count` is 0.
    pub fn new(image_count: u32) -> Self {
        assert!(image_count > 0, "image_count must be at least 1");
        Self {
            fences: (0..image_count).map(|_| None).collect(),
        }
    }

    /// Number of image slots.
    pub fn image_count(&self) -> u32 {
        self.fences.len() as u32
    }

    /// Wait until the GPU released `image_index`, up to `timeout`.
    ///
    /// Returns `true` if the slot is free. Slots that were never used or are
    /// out of range are free.
    pub fn wait_for_slot(&self, image_index: u32, timeout: Duration) -> bool {
        match self.fences.get(image_index as usize) {
            Some(Some(fence)) => {
                let ready = fence.wait_timeout(timeout);
                if !ready {
                    log::trace!("Image slot {} still busy after {:?}", image_index, timeout);
                }
                ready
            }
            _ => true,
        }
    }

    /// Record the fence of the frame just submitted in `image_index`.
    pub fn store_fence(&mut self, image_index: u32, fence: Fence) {
        if let Some(slot) = self.fences.get_mut(image_index as usize) {
            log::trace!("Stored fence for image slot {}", image_index);
            *slot = Some(fence);
        }
    }

    /// Block until every slot's GPU work has completed.
    ///
    /// Call before destroying GPU resources.
    pub fn wait_idle(&self) {
        log::trace!("Waiting for GPU idle ({} slots)", self.fences.len());
        for fence in self.fences.iter().flatten() {
            fence.wait();
        }
        log::trace!("GPU idle");
    }
}
