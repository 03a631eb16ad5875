//! Presentation engine boundary.
//!
//! Surfaces and swapchains are created by the host. The renderer only needs
//! to acquire the next image, present it and know the surface size.

use std::time::Duration;

use crate::error::PresentError;
use crate::types::Extent3d;
use crate::workflow::SurfaceBinding;

/// A presentable surface with a fixed number of images.
///
/// Implementations synchronize internally, so one engine can be shared
/// between the renderer and the host.
pub trait PresentationEngine: Send + Sync {
    /// Index of this surface in frame contexts.
    fn surface_index(&self) -> u32;

    /// Number of swapchain images.
    fn image_count(&self) -> u32;

    /// Current surface size.
    fn extent(&self) -> Extent3d;

    /// Acquire the next image, blocking at most `timeout`.
    ///
    /// Returns [`PresentError::Timeout`] if no image became available.
    fn acquire_image_index(&self, timeout: Duration) -> Result<u32, PresentError>;

    /// Queue an acquired image for display.
    fn present(&self, image_index: u32) -> Result<(), PresentError>;

    /// Surface description used to activate a workflow.
    fn surface_binding(&self) -> SurfaceBinding {
        SurfaceBinding {
            surface_index: self.surface_index(),
            extent: self.extent(),
            image_count: self.image_count(),
        }
    }
}
