//! Runtime streaming configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Result;

/// Thresholds driving per-frame refinement and eviction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Projected size below which a node's own points are good enough
    pub size_threshold: f32,
    /// Unload counter value a node must exceed before its children are evicted
    pub unload_threshold: u32,
    /// Rendered frames between eviction sweeps
    pub unload_interval: u32,
    /// Upper bound for `StreamingController::wait_for_loads`
    pub load_timeout_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            size_threshold: 0.2,
            unload_threshold: 30,
            unload_interval: 10,
            load_timeout_ms: 5000,
        }
    }
}

impl StreamingConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamingConfig::default();
        assert_eq!(config.unload_threshold, 30);
        assert_eq!(config.load_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json() {
        let config = StreamingConfig::from_json_str(r#"{ "size_threshold": 0.5, "unload_interval": 1 }"#).unwrap();
        assert_eq!(config.size_threshold, 0.5);
        assert_eq!(config.unload_interval, 1);
        assert_eq!(config.unload_threshold, 30);
    }
}
