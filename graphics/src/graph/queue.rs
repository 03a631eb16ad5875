//! Submission queue descriptions supplied by the host.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::OperationKind;

bitflags! {
    /// Work a queue can execute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct QueueCapabilities: u32 {
        /// Draw calls and render passes.
        const GRAPHICS = 1 << 0;
        /// Compute dispatches.
        const COMPUTE = 1 << 1;
        /// Copies.
        const TRANSFER = 1 << 2;
    }
}

impl Default for QueueCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// One submission queue: what it can do and how much work it should get.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueTraits {
    /// Supported operation kinds.
    pub capabilities: QueueCapabilities,
    /// Relative weight used when spreading operations over queues.
    pub priority: f32,
}

impl QueueTraits {
    /// Create queue traits.
    pub fn new(capabilities: QueueCapabilities, priority: f32) -> Self {
        Self {
            capabilities,
            priority,
        }
    }

    /// A queue that accepts every kind of work.
    pub fn graphics(priority: f32) -> Self {
        Self::new(QueueCapabilities::all(), priority)
    }

    /// A compute-only queue.
    pub fn compute(priority: f32) -> Self {
        Self::new(QueueCapabilities::COMPUTE, priority)
    }

    /// A transfer-only queue.
    pub fn transfer(priority: f32) -> Self {
        Self::new(QueueCapabilities::TRANSFER, priority)
    }

    /// Returns true if the priority is finite and positive. Queues without a
    /// valid priority are rejected by config and graph validation.
    pub fn has_valid_priority(&self) -> bool {
        self.priority.is_finite() && self.priority > 0.0
    }

    /// Returns true if this queue can execute operations of `kind`.
    pub fn supports(&self, kind: OperationKind) -> bool {
        self.capabilities.contains(kind.required_capabilities())
    }
}

impl Default for QueueTraits {
    fn default() -> Self {
        Self::graphics(0.75)
    }
}
