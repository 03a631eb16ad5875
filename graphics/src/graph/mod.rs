//! Render workflow graph.
//!
//! A [`WorkflowGraph`] declares what a frame renders:
//!
//! - [`ResourceType`]s: attachment templates (format, samples, size)
//! - [`RenderOperation`]s: units of GPU work, the graph's nodes
//! - [`AttachmentBinding`]s: input and output uses of named resources, the
//!   graph's edges
//!
//! Everything is stored in dense arrays and referenced by index handles or by
//! name. Operation dependencies are not declared explicitly: an operation that
//! reads a resource depends on every other operation that writes it. The
//! [`compiler`](crate::compiler) derives those edges, validates the graph and
//! produces the schedule.
//!
//! # Example
//!
//! ```ignore
//! let mut graph = WorkflowGraph::new();
//! graph.add_resource_type(ResourceType::new(
//!     "depthBuffer",
//!     AttachmentType::Depth,
//!     TextureFormat::Depth32Float,
//!     AttachmentSize::surface(),
//! ));
//! graph.add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm));
//! graph.add_render_operation(RenderOperation::graphics("Ortho3D"));
//! graph.add_attachment_output(
//!     AttachmentBinding::depth("Ortho3D", "depthBuffer", "depthOutput")
//!         .with_load_op(LoadOp::clear_depth(1.0)),
//! );
//! graph.add_attachment_output(
//!     AttachmentBinding::color("Ortho3D", "surface", "colorOutput")
//!         .with_load_op(LoadOp::clear_color(0.0, 0.0, 0.0, 1.0)),
//! );
//! ```

mod binding;
mod operation;
mod queue;
mod resource;

pub use binding::{AttachmentBinding, BindingHandle, BindingRole, Direction, LoadOp, StoreOp};
pub use operation::{OperationHandle, OperationKind, RenderOperation};
pub use queue::{QueueCapabilities, QueueTraits};
pub use resource::{AttachmentSize, AttachmentType, ResourceType, ResourceTypeHandle};

/// Declarative description of a frame's render operations and attachments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowGraph {
    resource_types: Vec<ResourceType>,
    operations: Vec<RenderOperation>,
    bindings: Vec<AttachmentBinding>,
}

impl WorkflowGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource type.
    pub fn add_resource_type(&mut self, resource_type: ResourceType) -> ResourceTypeHandle {
        let handle = ResourceTypeHandle::new(self.resource_types.len() as u32);
        self.resource_types.push(resource_type);
        handle
    }

    /// Declare a render operation.
    pub fn add_render_operation(&mut self, operation: RenderOperation) -> OperationHandle {
        let handle = OperationHandle::new(self.operations.len() as u32);
        self.operations.push(operation);
        handle
    }

    /// Record the pipeline an operation uses.
    ///
    /// Returns false, leaving the graph unchanged, if `operation` does not
    /// belong to this graph.
    pub fn set_operation_pipeline(
        &mut self,
        operation: OperationHandle,
        pipeline: impl Into<String>,
    ) -> bool {
        match self.operations.get_mut(operation.index()) {
            Some(op) => {
                op.pipeline = Some(pipeline.into());
                true
            }
            None => false,
        }
    }

    /// Add an input binding.
    pub fn add_attachment_input(&mut self, mut binding: AttachmentBinding) -> BindingHandle {
        binding.direction = Direction::Input;
        self.push_binding(binding)
    }

    /// Add an output binding.
    pub fn add_attachment_output(&mut self, mut binding: AttachmentBinding) -> BindingHandle {
        binding.direction = Direction::Output;
        self.push_binding(binding)
    }

    fn push_binding(&mut self, binding: AttachmentBinding) -> BindingHandle {
        let handle = BindingHandle::new(self.bindings.len() as u32);
        self.bindings.push(binding);
        handle
    }

    /// Resource types in declaration order.
    pub fn resource_types(&self) -> &[ResourceType] {
        &self.resource_types
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[RenderOperation] {
        &self.operations
    }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> &[AttachmentBinding] {
        &self.bindings
    }

    /// Get an operation by handle.
    pub fn operation(&self, handle: OperationHandle) -> Option<&RenderOperation> {
        self.operations.get(handle.index())
    }

    /// Get a resource type by handle.
    pub fn resource_type(&self, handle: ResourceTypeHandle) -> Option<&ResourceType> {
        self.resource_types.get(handle.index())
    }

    /// Find the first operation with `name`.
    pub fn find_operation(&self, name: &str) -> Option<OperationHandle> {
        self.operations
            .iter()
            .position(|op| op.name == name)
            .map(|index| OperationHandle::new(index as u32))
    }

    /// Find the first resource type with `name`.
    pub fn find_resource_type(&self, name: &str) -> Option<ResourceTypeHandle> {
        self.resource_types
            .iter()
            .position(|ty| ty.name == name)
            .map(|index| ResourceTypeHandle::new(index as u32))
    }

    /// Bindings of the operation named `operation`, in declaration order.
    pub fn bindings_of<'a>(
        &'a self,
        operation: &'a str,
    ) -> impl Iterator<Item = &'a AttachmentBinding> + 'a {
        self.bindings
            .iter()
            .filter(move |binding| binding.operation == operation)
    }

    /// Returns true if no operation is declared.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Remove everything from the graph.
    pub fn clear(&mut self) {
        self.resource_types.clear();
        self.operations.clear();
        self.bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;

    #[test]
    fn test_add_render_operation() {
        let mut graph = WorkflowGraph::new();
        let handle = graph.add_render_operation(RenderOperation::graphics("main"));
        assert_eq!(graph.operations().len(), 1);
        assert_eq!(graph.operation(handle).unwrap().name, "main");
        assert_eq!(graph.find_operation("main"), Some(handle));
        assert!(!graph.is_empty());
    }

    #[test]
    fn test_binding_direction_set_by_method() {
        let mut graph = WorkflowGraph::new();
        let out = graph.add_attachment_output(AttachmentBinding::color("a", "color", "c"));
        let input = graph.add_attachment_input(AttachmentBinding::image("b", "color", "c"));
        assert_eq!(graph.bindings()[out.index()].direction, Direction::Output);
        assert_eq!(graph.bindings()[input.index()].direction, Direction::Input);
        assert_eq!(graph.bindings_of("b").count(), 1);
    }

    #[test]
    fn test_set_operation_pipeline() {
        let mut graph = WorkflowGraph::new();
        let handle = graph.add_render_operation(RenderOperation::graphics("main"));
        assert!(graph.set_operation_pipeline(handle, "simple"));
        assert_eq!(graph.operation(handle).unwrap().pipeline.as_deref(), Some("simple"));
    }

    #[test]
    fn test_set_pipeline_invalid_handle() {
        let mut graph = WorkflowGraph::new();
        graph.add_render_operation(RenderOperation::graphics("main"));
        assert!(!graph.set_operation_pipeline(OperationHandle::new(3), "simple"));
        assert_eq!(graph.operations()[0].pipeline, None);
    }

    #[test]
    fn test_clear() {
        let mut graph = WorkflowGraph::new();
        graph.add_resource_type(ResourceType::surface("surface", TextureFormat::Bgra8Unorm));
        graph.add_render_operation(RenderOperation::graphics("main"));
        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.resource_types().is_empty());
    }
}
