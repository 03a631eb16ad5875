//! GPU backends.
//!
//! The renderer talks to the GPU through three traits:
//!
//! - [`PresentationEngine`](crate::present::PresentationEngine) - image acquisition and presentation
//! - [`QueueSubmitter`](crate::scheduler::QueueSubmitter) - batch execution, returns a fence
//! - [`GeometryLoader`](crate::assets::GeometryLoader) - CPU geometry by key
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: records everything and does no GPU work. Used by tests
//!   and the demo.

mod dummy;

pub use dummy::{DummyBackend, SubmissionRecord};
