//! Frame timing.
//!
//! - [`FrameClock`] - Monotonic frame index
//! - [`FrameContext`] - Identifies one in-flight rendering cycle
//! - [`FramePipeline`] - One GPU fence per image slot
//!
//! The clock is the only time source. Every replicated resource lookup is keyed
//! by a [`FrameContext`], and superseded resource copies retire after
//! [`ReplicationCounts::retirement_horizon`](crate::resources::ReplicationCounts::retirement_horizon)
//! frames.

mod clock;
mod context;
mod pipeline;

pub use clock::FrameClock;
pub use context::FrameContext;
pub use pipeline::FramePipeline;
