//! Replication policies.

use std::fmt;

use crate::frame::FrameContext;

/// How many physical copies a logical resource has and which one a frame uses.
///
/// The policy is fixed when the resource is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicationPolicy {
    /// One copy, written once and read by every frame.
    Single,
    /// One copy per logical GPU device.
    PerDevice,
    /// One copy per presentation target.
    PerSurface,
    /// One copy per in-flight image slot.
    PerImage,
}

/// The frame-context axis a policy selects on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicationAxis {
    /// `FrameContext::device_index`.
    Device,
    /// `FrameContext::surface_index`.
    Surface,
    /// `FrameContext::image_index`.
    Image,
}

impl fmt::Display for ReplicationAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => write!(f, "device"),
            Self::Surface => write!(f, "surface"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Replication counts of the running renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplicationCounts {
    /// Number of logical GPU devices.
    pub devices: u32,
    /// Number of presentation targets.
    pub surfaces: u32,
    /// Number of in-flight images (ImageCount).
    pub images: u32,
}

impl ReplicationCounts {
    /// Counts for a single device and surface with `images` in-flight images.
    pub fn with_images(images: u32) -> Self {
        Self {
            devices: 1,
            surfaces: 1,
            images,
        }
    }

    /// Frames after which a superseded copy is no longer referenced by any
    /// in-flight frame.
    pub fn retirement_horizon(&self) -> u64 {
        self.images as u64
    }
}

impl Default for ReplicationCounts {
    fn default() -> Self {
        Self::with_images(3)
    }
}

/// A frame-context index outside the replication count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutOfRange {
    pub axis: ReplicationAxis,
    pub index: u32,
    pub count: u32,
}

impl ReplicationPolicy {
    /// Axis used to select a copy, `None` for [`Single`](Self::Single).
    pub fn axis(&self) -> Option<ReplicationAxis> {
        match self {
            Self::Single => None,
            Self::PerDevice => Some(ReplicationAxis::Device),
            Self::PerSurface => Some(ReplicationAxis::Surface),
            Self::PerImage => Some(ReplicationAxis::Image),
        }
    }

    /// Number of physical copies under `counts`.
    pub fn copy_count(&self, counts: &ReplicationCounts) -> u32 {
        match self.axis() {
            None => 1,
            Some(ReplicationAxis::Device) => counts.devices,
            Some(ReplicationAxis::Surface) => counts.surfaces,
            Some(ReplicationAxis::Image) => counts.images,
        }
    }

    /// Copy slot the given frame context reads and writes.
    pub(crate) fn slot(
        &self,
        ctx: &FrameContext,
        counts: &ReplicationCounts,
    ) -> Result<usize, OutOfRange> {
        let Some(axis) = self.axis() else {
            return Ok(0);
        };
        let index = match axis {
            ReplicationAxis::Device => ctx.device_index,
            ReplicationAxis::Surface => ctx.surface_index,
            ReplicationAxis::Image => ctx.image_index,
        };
        let count = self.copy_count(counts);
        if index >= count {
            return Err(OutOfRange { axis, index, count });
        }
        Ok(index as usize)
    }
}

impl fmt::Display for ReplicationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::PerDevice => write!(f, "per-device"),
            Self::PerSurface => write!(f, "per-surface"),
            Self::PerImage => write!(f, "per-image"),
        }
    }
}
