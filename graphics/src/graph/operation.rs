//! Render operations: the nodes of a workflow graph.

use super::QueueCapabilities;

/// Handle to a render operation in a [`WorkflowGraph`](super::WorkflowGraph).
///
/// Only valid within the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationHandle(u32);

impl OperationHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Declaration index of the operation.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of GPU work an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Rasterization into attachments.
    Graphics,
    /// Compute dispatches.
    Compute,
    /// Buffer and image copies.
    Transfer,
}

impl OperationKind {
    /// Queue capabilities needed to run this kind of work.
    pub fn required_capabilities(self) -> QueueCapabilities {
        match self {
            Self::Graphics => QueueCapabilities::GRAPHICS,
            Self::Compute => QueueCapabilities::COMPUTE,
            Self::Transfer => QueueCapabilities::TRANSFER,
        }
    }
}

/// A unit of GPU work, typically one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOperation {
    /// Unique name within the graph.
    pub name: String,
    /// Kind of work.
    pub kind: OperationKind,
    /// Name of the pipeline object the host binds for this operation.
    pub pipeline: Option<String>,
}

impl RenderOperation {
    /// Create an operation.
    pub fn new(name: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            pipeline: None,
        }
    }

    /// Create a graphics operation.
    pub fn graphics(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Graphics)
    }

    /// Create a compute operation.
    pub fn compute(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Compute)
    }

    /// Create a transfer operation.
    pub fn transfer(name: impl Into<String>) -> Self {
        Self::new(name, OperationKind::Transfer)
    }

    /// Record the pipeline used by this operation.
    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }
}
