//! Replicated resource management.
//!
//! A *logical resource* is a named unit of GPU data (camera uniforms, instance
//! matrices, a depth attachment). The [`ResourceManager`] owns one or more
//! *physical copies* of each logical resource, as many as its
//! [`ReplicationPolicy`] requires, and decides which copy a frame reads and
//! writes.
//!
//! # Copy selection
//!
//! ```text
//! ImageCount = 3, "instances" is PerImage
//!
//! frame 0 (image 0) ──► copy 0
//! frame 1 (image 1) ──► copy 1
//! frame 2 (image 2) ──► copy 2
//! frame 3 (image 0) ──► copy 0   (GPU finished frame 0 before the write)
//! ```
//!
//! # Reallocation and retirement
//!
//! A write larger than a copy's capacity allocates a new copy of the next
//! capacity class and swaps it in. The old copy keeps its content and moves to
//! the retirement list, where handles to it stay readable until
//! [`ResourceManager::collect_retired`] passes its retirement frame
//! (`frame_index + ImageCount`).
//!
//! The render graph never holds copies. It refers to resources by name and
//! resolves them through the manager every frame.

mod manager;
mod policy;

pub use manager::{ExternalSync, ResourceManager};
pub use policy::{ReplicationAxis, ReplicationCounts, ReplicationPolicy};

use std::fmt;

use crate::types::{BufferUsage, ImageDescriptor};

/// Identifier of a logical resource.
///
/// Ids are dense and never reused, even after [`ResourceManager::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalResourceId(u32);

impl LogicalResourceId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LogicalResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Names one physical copy of a logical resource.
///
/// A handle is a plain value. It stays valid while the copy's generation is
/// current or retired but not yet collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalCopyHandle {
    /// Owning logical resource.
    pub resource: LogicalResourceId,
    /// Replication slot.
    pub slot: u32,
    /// Allocation generation of the copy.
    pub generation: u64,
}

/// Semantic type of a logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Uniform data (camera, lights, materials).
    Uniform,
    /// Storage buffer data (instance matrices).
    Storage,
    /// Framebuffer-class image.
    Image,
    /// Vertex data.
    Vertex,
    /// Index data.
    Index,
    /// Indirect draw commands.
    Indirect,
}

impl ResourceKind {
    /// Buffer usage implied by the kind.
    pub fn default_usage(&self) -> BufferUsage {
        match self {
            Self::Uniform => BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            Self::Storage => BufferUsage::STORAGE | BufferUsage::COPY_DST,
            Self::Image => BufferUsage::empty(),
            Self::Vertex => BufferUsage::VERTEX | BufferUsage::COPY_DST,
            Self::Index => BufferUsage::INDEX | BufferUsage::COPY_DST,
            Self::Indirect => {
                BufferUsage::INDIRECT | BufferUsage::STORAGE | BufferUsage::COPY_DST
            }
        }
    }
}

/// Byte layout and usage of a logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    /// Semantic type.
    pub kind: ResourceKind,
    /// Capacity in bytes of each copy at declaration.
    pub initial_capacity: u64,
    /// Buffer usage flags.
    pub usage: BufferUsage,
    /// Image description for [`ResourceKind::Image`] resources.
    pub image: Option<ImageDescriptor>,
}

impl ResourceDescriptor {
    /// Describe a buffer of the given kind with the kind's default usage.
    pub fn buffer(kind: ResourceKind, initial_capacity: u64) -> Self {
        Self {
            kind,
            initial_capacity,
            usage: kind.default_usage(),
            image: None,
        }
    }

    /// Describe a uniform buffer.
    pub fn uniform(initial_capacity: u64) -> Self {
        Self::buffer(ResourceKind::Uniform, initial_capacity)
    }

    /// Describe a storage buffer.
    pub fn storage(initial_capacity: u64) -> Self {
        Self::buffer(ResourceKind::Storage, initial_capacity)
    }

    /// Describe an indirect command buffer.
    pub fn indirect(initial_capacity: u64) -> Self {
        Self::buffer(ResourceKind::Indirect, initial_capacity)
    }

    /// Describe an image; capacity is its byte size.
    pub fn image(image: ImageDescriptor) -> Self {
        Self {
            kind: ResourceKind::Image,
            initial_capacity: image.byte_size(),
            usage: BufferUsage::empty(),
            image: Some(image),
        }
    }

    /// Override the usage flags.
    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }
}
