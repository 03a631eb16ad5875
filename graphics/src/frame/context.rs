/// Identifies one in-flight rendering cycle.
///
/// The resource manager selects a physical copy from the index that matches a
/// resource's replication policy: `image_index` for per-image resources,
/// `device_index` for per-device and `surface_index` for per-surface ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameContext {
    /// Monotonic frame index from the frame clock.
    pub frame_index: u64,
    /// Presentation image slot owned by this frame.
    pub image_index: u32,
    /// Logical GPU device.
    pub device_index: u32,
    /// Presentation target.
    pub surface_index: u32,
}

impl FrameContext {
    /// Create a context on device 0, surface 0.
    pub fn new(frame_index: u64, image_index: u32) -> Self {
        Self {
            frame_index,
            image_index,
            device_index: 0,
            surface_index: 0,
        }
    }

    /// Set the device index.
    pub fn with_device(mut self, device_index: u32) -> Self {
        self.device_index = device_index;
        self
    }

    /// Set the surface index.
    pub fn with_surface(mut self, surface_index: u32) -> Self {
        self.surface_index = surface_index;
        self
    }
}

impl std::fmt::Display for FrameContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "frame {} (image {}, device {}, surface {})",
            self.frame_index, self.image_index, self.device_index, self.surface_index
        )
    }
}
