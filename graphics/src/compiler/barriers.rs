//! Barrier placement between producers and consumers of each resource.

use std::collections::HashMap;

use crate::types::ImageLayout;

/// Why a barrier is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hazard {
    /// Layout transition or queue ownership transfer only.
    Layout,
    /// Reading what a previous operation wrote.
    ReadAfterWrite,
    /// Overwriting what previous operations read.
    WriteAfterRead,
    /// Overwriting what a previous operation wrote.
    WriteAfterWrite,
}

/// Synchronization recorded before an operation (or before presentation).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Barrier {
    /// Resource name.
    pub resource: String,
    /// Layout before the barrier.
    pub old_layout: ImageLayout,
    /// Layout after the barrier.
    pub new_layout: ImageLayout,
    /// Hazard resolved by the barrier.
    pub hazard: Hazard,
    /// Queue of the previous access. `None` on first use in the frame.
    pub src_queue: Option<usize>,
    /// Queue of the next access.
    pub dst_queue: usize,
}

impl Barrier {
    /// Returns true if ownership moves between queues.
    pub fn is_queue_transfer(&self) -> bool {
        self.src_queue.is_some_and(|src| src != self.dst_queue)
    }

    /// Returns true if the image layout changes.
    pub fn is_layout_transition(&self) -> bool {
        self.old_layout != self.new_layout
    }
}

/// Combined access of one operation to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Access {
    pub(crate) layout: ImageLayout,
    pub(crate) reads: bool,
    pub(crate) writes: bool,
    pub(crate) is_buffer: bool,
}

#[derive(Debug, Clone, Copy)]
struct ResourceState {
    layout: ImageLayout,
    wrote: bool,
    queue: usize,
}

/// Tracks the last access of each resource along the schedule.
#[derive(Debug, Default)]
pub(crate) struct BarrierTracker {
    states: HashMap<String, ResourceState>,
}

impl BarrierTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an access and return the barrier it needs, if any.
    ///
    /// `initial_layout` is the layout the resource is in before its first
    /// access of the frame.
    pub(crate) fn access(
        &mut self,
        resource: &str,
        access: Access,
        queue: usize,
        initial_layout: ImageLayout,
    ) -> Option<Barrier> {
        let next = ResourceState {
            layout: access.layout,
            wrote: access.writes,
            queue,
        };
        let Some(previous) = self.states.insert(resource.to_string(), next) else {
            if access.is_buffer || initial_layout == access.layout {
                return None;
            }
            return Some(Barrier {
                resource: resource.to_string(),
                old_layout: initial_layout,
                new_layout: access.layout,
                hazard: Hazard::Layout,
                src_queue: None,
                dst_queue: queue,
            });
        };

        let hazard = match (previous.wrote, access.reads, access.writes) {
            (true, true, _) => Some(Hazard::ReadAfterWrite),
            (true, false, _) => Some(Hazard::WriteAfterWrite),
            (false, _, true) => Some(Hazard::WriteAfterRead),
            (false, _, false) => None,
        };
        let layout_change = previous.layout != access.layout;
        let queue_change = previous.queue != queue;
        if hazard.is_none() && !layout_change && !queue_change {
            return None;
        }

        Some(Barrier {
            resource: resource.to_string(),
            old_layout: previous.layout,
            new_layout: access.layout,
            hazard: hazard.unwrap_or(Hazard::Layout),
            src_queue: Some(previous.queue),
            dst_queue: queue,
        })
    }

    /// Transition a resource into `layout` after its last access.
    pub(crate) fn release(&self, resource: &str, layout: ImageLayout) -> Option<Barrier> {
        let state = self.states.get(resource)?;
        Some(Barrier {
            resource: resource.to_string(),
            old_layout: state.layout,
            new_layout: layout,
            hazard: if state.wrote {
                Hazard::ReadAfterWrite
            } else {
                Hazard::Layout
            },
            src_queue: Some(state.queue),
            dst_queue: state.queue,
        })
    }
}
