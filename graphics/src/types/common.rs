//! Common types shared across the graphics system.

use serde::{Deserialize, Serialize};

/// 3D extent for images and surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D images).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of texels covered by the extent.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth.max(1) as u64
    }

    /// Scale width and height, rounding to nearest and keeping at least one texel.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            width: ((self.width as f32 * sx).round() as u32).max(1),
            height: ((self.height as f32 * sy).round() as u32).max(1),
            depth: self.depth.max(1),
        }
    }
}

/// Clear value for attachments.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// No clear operation.
    #[default]
    None,
    /// Clear color attachment with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth attachment.
    Depth(f32),
    /// Clear depth and stencil attachments.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a depth clear value.
    pub fn depth(value: f32) -> Self {
        Self::Depth(value)
    }

    /// Create a depth + stencil clear value.
    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::DepthStencil { depth, stencil }
    }
}
