//! Attachment bindings: the edges of a workflow graph.
//!
//! A binding connects a render operation to a named resource through a
//! resource type. Bindings reference everything by name, so a graph can be
//! declared in any order and checked as a whole at compile time.

use crate::types::{ClearValue, ImageLayout};

/// Operation to perform when loading an attachment at the start of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Clear the attachment with a specified value.
    Clear(ClearValue),
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    /// Create a clear operation with a depth value.
    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }

    /// Create a clear operation with depth and stencil values.
    pub fn clear_depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::Clear(ClearValue::depth_stencil(depth, stencil))
    }

    /// Returns true if previous contents are read.
    pub fn reads_previous(&self) -> bool {
        matches!(self, Self::Load)
    }
}

/// Operation to perform when storing an attachment at the end of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the operation (may be discarded).
    DontCare,
}

/// Whether an operation consumes or produces the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
}

/// How the resource is accessed by the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingRole {
    /// Color attachment (output) or input attachment (input).
    Color,
    /// Depth/stencil attachment.
    Depth,
    /// Sampled (input) or storage (output) image.
    Image,
    /// Storage buffer.
    Buffer,
}

impl BindingRole {
    /// Layout used when a binding does not name one.
    pub fn default_layout(self, direction: Direction) -> ImageLayout {
        match (self, direction) {
            (Self::Color, Direction::Output) => ImageLayout::ColorAttachment,
            (Self::Color, Direction::Input) => ImageLayout::ShaderReadOnly,
            (Self::Depth, Direction::Output) => ImageLayout::DepthStencilAttachment,
            (Self::Depth, Direction::Input) => ImageLayout::DepthStencilReadOnly,
            (Self::Image, Direction::Output) => ImageLayout::General,
            (Self::Image, Direction::Input) => ImageLayout::ShaderReadOnly,
            (Self::Buffer, _) => ImageLayout::General,
        }
    }
}

impl std::fmt::Display for BindingRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Color => "color",
            Self::Depth => "depth",
            Self::Image => "image",
            Self::Buffer => "buffer",
        };
        f.write_str(name)
    }
}

/// Handle to a binding in a [`WorkflowGraph`](super::WorkflowGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingHandle(u32);

impl BindingHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Declaration index of the binding.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One input or output use of a resource by a render operation.
///
/// # Example
///
/// ```ignore
/// workflow.add_attachment_output(
///     AttachmentBinding::depth("Ortho3D", "depthBuffer", "depthOutput")
///         .with_load_op(LoadOp::clear_depth(1.0)),
/// )?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentBinding {
    /// Name of the operation.
    pub operation: String,
    /// Name of the resource type the resource is created from.
    pub resource_type: String,
    /// Name of the resource. Operations sharing a name share the resource.
    pub resource: String,
    /// Input or output. Set by the graph method that adds the binding.
    pub direction: Direction,
    /// How the resource is accessed.
    pub role: BindingRole,
    /// Explicit layout. Falls back to the role's default.
    pub layout: Option<ImageLayout>,
    /// Load behavior at the start of the operation.
    pub load_op: LoadOp,
    /// Store behavior at the end of the operation.
    pub store_op: StoreOp,
}

impl AttachmentBinding {
    /// Create a binding with the given role.
    pub fn new(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
        role: BindingRole,
    ) -> Self {
        Self {
            operation: operation.into(),
            resource_type: resource_type.into(),
            resource: resource.into(),
            direction: Direction::Input,
            role,
            layout: None,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
        }
    }

    /// Color (or input) attachment.
    pub fn color(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(operation, resource_type, resource, BindingRole::Color)
    }

    /// Depth/stencil attachment.
    pub fn depth(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(operation, resource_type, resource, BindingRole::Depth)
    }

    /// Sampled or storage image.
    pub fn image(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(operation, resource_type, resource, BindingRole::Image)
    }

    /// Storage buffer.
    pub fn buffer(
        operation: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(operation, resource_type, resource, BindingRole::Buffer)
    }

    /// Set the layout the resource must be in during the operation.
    pub fn with_layout(mut self, layout: ImageLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set the load operation.
    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Layout the resource must be in during the operation.
    pub fn effective_layout(&self) -> ImageLayout {
        self.layout
            .unwrap_or_else(|| self.role.default_layout(self.direction))
    }

    /// Returns true if the operation reads the resource through this binding.
    ///
    /// Outputs read when they load previous contents.
    pub fn reads(&self) -> bool {
        match self.direction {
            Direction::Input => true,
            Direction::Output => self.role != BindingRole::Buffer && self.load_op.reads_previous(),
        }
    }

    /// Returns true if the operation writes the resource through this binding.
    pub fn writes(&self) -> bool {
        self.direction == Direction::Output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layouts() {
        let mut binding = AttachmentBinding::depth("op", "depth", "d");
        assert_eq!(binding.effective_layout(), ImageLayout::DepthStencilReadOnly);
        binding.direction = Direction::Output;
        assert_eq!(binding.effective_layout(), ImageLayout::DepthStencilAttachment);
        let binding = binding.with_layout(ImageLayout::General);
        assert_eq!(binding.effective_layout(), ImageLayout::General);
    }

    #[test]
    fn test_access() {
        let mut output = AttachmentBinding::color("op", "color", "c")
            .with_load_op(LoadOp::clear_color(0.0, 0.0, 0.0, 1.0));
        output.direction = Direction::Output;
        assert!(output.writes());
        assert!(!output.reads());

        let output = output.with_load_op(LoadOp::Load);
        assert!(output.reads());

        let input = AttachmentBinding::image("op", "color", "c");
        assert!(input.reads());
        assert!(!input.writes());
    }
}
