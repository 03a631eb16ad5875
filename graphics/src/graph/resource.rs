//! Resource types: templates for the attachments a workflow binds.

use crate::types::{Extent3d, TextureFormat, TextureUsage};

/// Handle to a resource type in a [`WorkflowGraph`](super::WorkflowGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTypeHandle(u32);

impl ResourceTypeHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Declaration index of the resource type.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a resource type is attached as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentType {
    /// Color render target.
    Color,
    /// Depth-only target.
    Depth,
    /// Combined depth/stencil target.
    DepthStencil,
    /// The presentable surface image. Owned by the presentation engine.
    Surface,
    /// Storage buffer shared between operations.
    Buffer,
}

impl AttachmentType {
    /// Returns true for image-backed types.
    pub fn is_image(self) -> bool {
        !matches!(self, Self::Buffer)
    }

    /// Returns true for depth or depth/stencil types.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth | Self::DepthStencil)
    }
}

/// Size of the resources created from a resource type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttachmentSize {
    /// Surface extent scaled per axis.
    SurfaceDependent { scale_x: f32, scale_y: f32 },
    /// Fixed image extent.
    Absolute { width: u32, height: u32 },
    /// Buffer size in bytes.
    Bytes(u64),
}

impl AttachmentSize {
    /// Same size as the surface.
    pub fn surface() -> Self {
        Self::SurfaceDependent {
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Image extent for a surface of `surface` size. `None` for buffers.
    pub fn image_extent(&self, surface: Extent3d) -> Option<Extent3d> {
        match *self {
            Self::SurfaceDependent { scale_x, scale_y } => Some(surface.scaled(scale_x, scale_y)),
            Self::Absolute { width, height } => Some(Extent3d::new_2d(width, height)),
            Self::Bytes(_) => None,
        }
    }
}

/// A template for attachments: format, sample count, size and usage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceType {
    /// Unique name within the graph.
    pub name: String,
    /// Whether content must survive between frames.
    pub persistent: bool,
    /// Texel format. Ignored for buffers.
    pub format: TextureFormat,
    /// MSAA sample count.
    pub samples: u32,
    /// What the type is attached as.
    pub attachment_type: AttachmentType,
    /// Size of instantiated resources.
    pub size: AttachmentSize,
    /// Usage of instantiated images.
    pub usage: TextureUsage,
}

impl ResourceType {
    /// Describe an image-backed type.
    pub fn new(
        name: impl Into<String>,
        attachment_type: AttachmentType,
        format: TextureFormat,
        size: AttachmentSize,
    ) -> Self {
        let usage = match attachment_type {
            AttachmentType::Depth | AttachmentType::DepthStencil => {
                TextureUsage::DEPTH_STENCIL_ATTACHMENT
            }
            AttachmentType::Buffer => TextureUsage::empty(),
            _ => TextureUsage::COLOR_ATTACHMENT,
        };
        Self {
            name: name.into(),
            persistent: false,
            format,
            samples: 1,
            attachment_type,
            size,
            usage,
        }
    }

    /// The presentable surface, sized like the surface.
    pub fn surface(name: impl Into<String>, format: TextureFormat) -> Self {
        Self::new(name, AttachmentType::Surface, format, AttachmentSize::surface())
            .with_persistent(true)
    }

    /// A storage buffer type of `size` bytes.
    pub fn buffer(name: impl Into<String>, size: u64) -> Self {
        Self::new(
            name,
            AttachmentType::Buffer,
            TextureFormat::default(),
            AttachmentSize::Bytes(size),
        )
    }

    /// Set persistence.
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Set the sample count.
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Set image usage.
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }
}
