//! # Kestrel Core
//!
//! GPU-agnostic building blocks for the Kestrel renderer: `nalgebra` math
//! aliases, bounding boxes and CPU-side geometry.

pub mod math;
pub mod mesh;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core version. Called once by hosts after installing a logger.
pub fn init() {
    log::info!("Kestrel Core v{} initialized", VERSION);
}
