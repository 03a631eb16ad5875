//! Buffer usage flags and indirect draw records.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
        /// Buffer is mappable for CPU write.
        const MAP_WRITE = 1 << 7;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Arguments for an indexed indirect draw call.
///
/// This struct matches the GPU layout for `vkCmdDrawIndexedIndirect`.
/// The buffer containing these arguments must have [`BufferUsage::INDIRECT`].
///
/// # Memory Layout
///
/// The struct is `#[repr(C)]` to ensure GPU-compatible memory layout:
/// - Total size: 20 bytes
/// - Alignment: 4 bytes
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, bytemuck::Pod, bytemuck::Zeroable,
)]
pub struct DrawIndexedIndirectArgs {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Index of the first index to draw.
    pub first_index: u32,
    /// Value added to each index before reading from the vertex buffer.
    pub base_vertex: i32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<DrawIndexedIndirectArgs>(), 20);

impl DrawIndexedIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create new indexed indirect draw arguments.
    pub fn new(index_count: u32, instance_count: u32) -> Self {
        Self {
            index_count,
            instance_count,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    /// Set the first index.
    pub fn with_first_index(mut self, first_index: u32) -> Self {
        self.first_index = first_index;
        self
    }

    /// Set the base vertex offset.
    pub fn with_base_vertex(mut self, base_vertex: i32) -> Self {
        self.base_vertex = base_vertex;
        self
    }

    /// Set the first instance index.
    pub fn with_first_instance(mut self, first_instance: u32) -> Self {
        self.first_instance = first_instance;
        self
    }

    /// View as bytes for uploading to a buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
