//! Renderer configuration.
//!
//! [`RendererConfig`] collects the knobs fixed at renderer creation. It can
//! be built in code or loaded from RON; missing fields take their defaults:
//!
//! ```ron
//! (
//!     image_count: 3,
//!     acquire_timeout_ms: 100,
//!     queues: [(capabilities: "GRAPHICS | COMPUTE | TRANSFER", priority: 0.75)],
//! )
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::QueueTraits;
use crate::resources::ReplicationCounts;

/// Settings of a [`FrameRenderer`](crate::renderer::FrameRenderer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// In-flight images (ImageCount). Per-image resources get this many copies.
    pub image_count: u32,
    /// Logical GPU devices.
    pub device_count: u32,
    /// Presentation targets.
    pub surface_count: u32,
    /// Hard maximum size of one physical copy, in bytes.
    pub max_resource_capacity: u64,
    /// Bound on a single image acquisition.
    pub acquire_timeout_ms: u64,
    /// Bound on waiting for an image slot's previous frame.
    pub fence_timeout_ms: u64,
    /// Consecutive skipped frames (acquire or image-slot timeouts) tolerated
    /// before the renderer gives up.
    pub max_consecutive_acquire_timeouts: u32,
    /// Queues workflows are compiled for.
    pub queues: Vec<QueueTraits>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            device_count: 1,
            surface_count: 1,
            max_resource_capacity: 256 * 1024 * 1024,
            acquire_timeout_ms: 100,
            fence_timeout_ms: 1000,
            max_consecutive_acquire_timeouts: 3,
            queues: vec![QueueTraits::default()],
        }
    }
}

impl RendererConfig {
    /// Parse a RON document.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_ron_str(&text)?;
        log::debug!("Loaded renderer config from {}", path.display());
        Ok(config)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));
        if self.image_count == 0 {
            return invalid("image_count must be at least 1");
        }
        if self.device_count == 0 {
            return invalid("device_count must be at least 1");
        }
        if self.surface_count == 0 {
            return invalid("surface_count must be at least 1");
        }
        if self.max_resource_capacity == 0 {
            return invalid("max_resource_capacity must be positive");
        }
        if self.max_consecutive_acquire_timeouts == 0 {
            return invalid("max_consecutive_acquire_timeouts must be at least 1");
        }
        if self.queues.is_empty() {
            return invalid("at least one queue is required");
        }
        if let Some(index) = self
            .queues
            .iter()
            .position(|q| !q.has_valid_priority())
        {
            return Err(ConfigError::Invalid(format!(
                "queue {index} must have a positive priority"
            )));
        }
        Ok(())
    }

    /// Set the number of in-flight images.
    pub fn with_image_count(mut self, image_count: u32) -> Self {
        self.image_count = image_count;
        self
    }

    /// Set the hard maximum copy size.
    pub fn with_max_resource_capacity(mut self, bytes: u64) -> Self {
        self.max_resource_capacity = bytes;
        self
    }

    /// Set the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the image slot wait timeout.
    pub fn with_fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set how many consecutive acquire timeouts are tolerated.
    pub fn with_max_consecutive_acquire_timeouts(mut self, count: u32) -> Self {
        self.max_consecutive_acquire_timeouts = count;
        self
    }

    /// Replace the queue list.
    pub fn with_queues(mut self, queues: Vec<QueueTraits>) -> Self {
        self.queues = queues;
        self
    }

    /// Copy counts for the resource manager.
    pub fn replication_counts(&self) -> ReplicationCounts {
        ReplicationCounts {
            devices: self.device_count,
            surfaces: self.surface_count,
            images: self.image_count,
        }
    }

    /// Acquire timeout as a duration.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Image slot wait timeout as a duration.
    pub fn fence_timeout(&self) -> Duration {
        Duration::from_millis(self.fence_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::QueueCapabilities;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.image_count, 3);
        assert_eq!(config.queues, vec![QueueTraits::graphics(0.75)]);
        assert!(config.validate().is_ok());
        assert_eq!(config.replication_counts(), ReplicationCounts::with_images(3));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = RendererConfig::from_ron_str("(image_count: 2, acquire_timeout_ms: 16)").unwrap();
        assert_eq!(config.image_count, 2);
        assert_eq!(config.acquire_timeout(), Duration::from_millis(16));
        assert_eq!(config.max_consecutive_acquire_timeouts, 3);
    }

    #[test]
    fn test_round_trip() {
        let config = RendererConfig::default().with_queues(vec![
            QueueTraits::graphics(0.75),
            QueueTraits::compute(0.25),
        ]);
        let text = config.to_ron_string().unwrap();
        assert_eq!(RendererConfig::from_ron_str(&text).unwrap(), config);
        assert!(config.queues[1].capabilities.contains(QueueCapabilities::COMPUTE));
    }

    #[test]
    fn test_invalid_values() {
        let zero_images = RendererConfig::default().with_image_count(0);
        assert!(matches!(zero_images.validate(), Err(ConfigError::Invalid(_))));

        let bad_queue = RendererConfig::default().with_queues(vec![QueueTraits::graphics(0.0)]);
        assert_eq!(
            bad_queue.validate(),
            Err(ConfigError::Invalid("queue 0 must have a positive priority".into()))
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            RendererConfig::from_ron_str("(image_count: \"three\")"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = RendererConfig::load("/nonexistent/renderer.ron").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
