//! Graphics error types.
//!
//! Each component reports its own error enum. [`GraphicsError`] unifies them
//! for the frame renderer and for update tasks, and [`ErrorCategory`] tells
//! the host how to react.

use thiserror::Error;

use crate::graph::OperationKind;
use crate::resources::{LogicalResourceId, ReplicationAxis};
use crate::workflow::WorkflowState;

/// Coarse classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Duplicate names or ids, unknown references, illegal state transitions.
    /// Surfaced at declaration time and never retried.
    Configuration,
    /// Graph inconsistency found at compile time.
    Validation,
    /// Oversized payload. No partial write happened.
    Capacity,
    /// Recoverable by skipping the current frame.
    Transient,
    /// The renderer cannot continue.
    Fatal,
}

/// Errors of the replicated resource manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("resource '{0}' is already declared")]
    DuplicateName(String),
    #[error("unknown resource {0}")]
    UnknownResource(LogicalResourceId),
    #[error("payload of {size} bytes for '{name}' exceeds the maximum capacity of {max} bytes")]
    CapacityExceeded { name: String, size: u64, max: u64 },
    #[error("{axis} index {index} is out of range for '{name}' ({count} copies)")]
    FrameContextOutOfRange {
        name: String,
        axis: ReplicationAxis,
        index: u32,
        count: u32,
    },
    #[error(
        "'{name}' uses the single policy and was already written; rewrites require external synchronization"
    )]
    UnsynchronizedRewrite { name: String },
    #[error("handle to copy {slot} of '{name}' (generation {generation}) is stale")]
    StaleHandle {
        name: String,
        slot: u32,
        generation: u64,
    },
}

impl ResourceError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CapacityExceeded { .. } => ErrorCategory::Capacity,
            _ => ErrorCategory::Configuration,
        }
    }
}

/// Errors of the asset/LOD aggregator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetError {
    #[error("asset type {0} is already registered")]
    DuplicateAssetId(u32),
    #[error("asset type {0} is not registered")]
    UnknownAssetId(u32),
    #[error("asset type {0} has no level of detail registered")]
    NoLevelOfDetail(u32),
    #[error("unknown geometry {0}")]
    UnknownGeometry(u32),
    #[error("invalid LOD threshold {threshold} for asset type {asset}")]
    InvalidThreshold { asset: u32, threshold: f32 },
    #[error("geometry '{label}' does not match the vertex layout of the shared storage")]
    LayoutMismatch { label: String },
    #[error("geometry loader failed for '{key}': {reason}")]
    LoadFailed { key: String, reason: String },
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl AssetError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Resource(err) => err.category(),
            Self::LoadFailed { .. } => ErrorCategory::Fatal,
            _ => ErrorCategory::Configuration,
        }
    }
}

/// A workflow graph that cannot be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphValidationError {
    #[error("workflow graph has no render operations")]
    Empty,
    #[error("no submission queues are declared")]
    NoQueues,
    #[error("queue {queue} must have a finite, positive priority")]
    InvalidQueuePriority { queue: usize },
    #[error("resource type '{0}' is declared more than once")]
    DuplicateResourceType(String),
    #[error("render operation '{0}' is declared more than once")]
    DuplicateOperation(String),
    #[error(
        "binding '{resource}' of operation '{operation}' references undeclared resource type '{resource_type}'"
    )]
    UnknownResourceType {
        operation: String,
        resource: String,
        resource_type: String,
    },
    #[error("binding '{resource}' references undeclared render operation '{operation}'")]
    UnknownOperation { operation: String, resource: String },
    #[error(
        "binding '{resource}' of operation '{operation}' is a {role} attachment but resource type '{resource_type}' does not allow it"
    )]
    RoleMismatch {
        operation: String,
        resource: String,
        resource_type: String,
        role: String,
    },
    #[error(
        "resource '{resource}' is bound as '{first_type}' by '{first_operation}' and as '{second_type}' by '{second_operation}' with a different format or sample count"
    )]
    InconsistentAttachment {
        resource: String,
        first_operation: String,
        first_type: String,
        second_operation: String,
        second_type: String,
    },
    #[error("render operations form a dependency cycle: {}", .operations.join(", "))]
    Cycle { operations: Vec<String> },
    #[error("no render operation outputs to a surface resource type")]
    NoSurfaceOutput,
    #[error("render operation '{operation}' ({kind:?}) has no compatible queue")]
    NoCompatibleQueue {
        operation: String,
        kind: OperationKind,
    },
}

/// Errors of the render workflow state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow '{workflow}' is {state:?}; the graph can only change while building")]
    NotBuilding {
        workflow: String,
        state: WorkflowState,
    },
    #[error("workflow '{workflow}' must be compiled before activation (state: {state:?})")]
    NotCompiled {
        workflow: String,
        state: WorkflowState,
    },
    #[error("workflow '{0}' has no active schedule")]
    NotActive(String),
    #[error("workflow '{workflow}' has no render operation with handle {index}")]
    UnknownOperationHandle { workflow: String, index: usize },
    #[error("surface has {surface} images but per-image resources replicate over {expected}")]
    ImageCountMismatch { surface: u32, expected: u32 },
    #[error(transparent)]
    Validation(#[from] GraphValidationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl WorkflowError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Resource(err) => err.category(),
            _ => ErrorCategory::Configuration,
        }
    }
}

/// Errors reported by the presentation engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentError {
    #[error("timed out acquiring the next image after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("surface is out of date and must be reconfigured")]
    OutOfDate,
    #[error("surface lost")]
    SurfaceLost,
}

impl PresentError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout { .. } | Self::OutOfDate => ErrorCategory::Transient,
            Self::SurfaceLost => ErrorCategory::Fatal,
        }
    }
}

/// Errors of the update task graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpdateError {
    #[error("task '{task}' wrote resource '{resource}' which it did not declare")]
    UndeclaredWrite { task: String, resource: String },
    #[error("update tasks form a cycle: {}", .tasks.join(", "))]
    Cycle { tasks: Vec<String> },
    #[error("update task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        source: Box<GraphicsError>,
    },
    #[error("update task '{task}' panicked")]
    TaskPanicked { task: String },
}

impl UpdateError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TaskFailed { source, .. } => source.category(),
            Self::TaskPanicked { .. } => ErrorCategory::Fatal,
            _ => ErrorCategory::Configuration,
        }
    }
}

/// Errors loading or validating a [`RendererConfig`](crate::config::RendererConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read renderer config '{path}': {message}")]
    Io { path: String, message: String },
    #[error("failed to parse renderer config: {0}")]
    Parse(String),
    #[error("invalid renderer config: {0}")]
    Invalid(String),
}

/// Errors that can occur in the graphics system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphicsError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Validation(#[from] GraphValidationError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Present(#[from] PresentError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Image acquisition or the wait for the acquired image slot timed out
    /// on too many consecutive frames.
    #[error("no usable image within the timeout on {count} consecutive frames")]
    AcquireTimeoutsExceeded { count: u32 },
    #[error("frame {got} ended but the pending frame is {expected:?}")]
    FrameMismatch { expected: Option<u64>, got: u64 },
    #[error("frame {0} is still pending; end or drop it before beginning another")]
    FrameInProgress(u64),
}

impl GraphicsError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Resource(err) => err.category(),
            Self::Asset(err) => err.category(),
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Workflow(err) => err.category(),
            Self::Present(err) => err.category(),
            Self::Update(err) => err.category(),
            Self::Config(_) | Self::FrameMismatch { .. } | Self::FrameInProgress(_) => {
                ErrorCategory::Configuration
            }
            Self::AcquireTimeoutsExceeded { .. } => ErrorCategory::Fatal,
        }
    }

    /// Returns true if skipping the current frame recovers from this error.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Result alias used across the crate.
pub type GraphicsResult<T> = Result<T, GraphicsError>;
