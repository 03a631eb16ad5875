//! Common types and descriptors for graphics resources.
//!
//! This module contains format enums, usage flags, image layouts and the
//! GPU-visible indirect draw record used throughout the graphics system.

mod buffer;
mod common;
mod texture;

pub use buffer::{BufferUsage, DrawIndexedIndirectArgs};
pub use common::{ClearValue, Extent3d};
pub use texture::{ImageDescriptor, ImageLayout, TextureFormat, TextureUsage};
