//! Image formats, usage flags, layouts and descriptors.

use super::Extent3d;
use bitflags::bitflags;

/// Image format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,

    // 16-bit formats
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit red-green channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 8-bit RGBA, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, unsigned normalized. The usual presentable surface format.
    Bgra8Unorm,
    /// 8-bit BGRA, sRGB.
    Bgra8UnormSrgb,

    // 64-bit formats
    /// 16-bit RGBA, float.
    Rgba16Float,

    // 128-bit formats
    /// 32-bit RGBA, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24PlusStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    /// Returns the size in bytes per pixel/block.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Uint => 1,
            Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for images.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Image can be copied from.
        const COPY_SRC = 1 << 0;
        /// Image can be copied to.
        const COPY_DST = 1 << 1;
        /// Image can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Image can be used as a storage image.
        const STORAGE_BINDING = 1 << 3;
        /// Image can be used as a color render attachment.
        const COLOR_ATTACHMENT = 1 << 4;
        /// Image can be used as a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        /// Image can be read as an input attachment.
        const INPUT_ATTACHMENT = 1 << 6;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Layout an image must be in for a given access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents are undefined. Only valid as a source layout.
    #[default]
    Undefined,
    /// Usable for any access, at reduced performance.
    General,
    /// Color render target.
    ColorAttachment,
    /// Depth/stencil render target.
    DepthStencilAttachment,
    /// Read-only depth/stencil (sampling + depth test).
    DepthStencilReadOnly,
    /// Sampled in a shader.
    ShaderReadOnly,
    /// Source of a copy.
    TransferSrc,
    /// Destination of a copy.
    TransferDst,
    /// Ready for the presentation engine.
    PresentSrc,
}

impl ImageLayout {
    /// Returns true if an image in this layout may be written.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Self::General | Self::ColorAttachment | Self::DepthStencilAttachment | Self::TransferDst
        )
    }
}

/// Descriptor of an image-class resource backed by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    /// Size of the image.
    pub size: Extent3d,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Image format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl ImageDescriptor {
    /// Create a new 2D image descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            size: Extent3d::new_2d(width, height),
            sample_count: 1,
            format,
            usage,
        }
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Bytes needed to back one copy of the image.
    pub fn byte_size(&self) -> u64 {
        self.size.texel_count() * self.format.block_size() as u64 * self.sample_count.max(1) as u64
    }
}

impl Default for ImageDescriptor {
    fn default() -> Self {
        Self {
            size: Extent3d::default(),
            sample_count: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
        }
    }
}
