//! Build-time octree configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Parameters controlling octree subdivision and LOD reduction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Subgrid cells per axis inside every node
    pub resolution: u32,
    /// Maximum subdivision depth below the root
    pub max_depth: u32,
    /// Buffered points a colliding leaf may hold before it must split.
    /// `None` means `4 * resolution^2`.
    pub split_threshold: Option<usize>,
    /// Shift the reduction grid by a random sub-cell offset when coarsening
    /// inner nodes, so cell boundaries do not line up across levels
    pub jitter: bool,
    /// Seed for the jitter generator
    pub seed: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            resolution: 16,
            max_depth: 10,
            split_threshold: None,
            jitter: true,
            seed: 0x5eed,
        }
    }
}

impl BuildConfig {
    /// Effective split threshold
    pub fn split_threshold(&self) -> usize {
        self.split_threshold
            .unwrap_or_else(|| 4 * (self.resolution as usize).pow(2))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameters the octree and reducer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(Error::Config("resolution must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_threshold() {
        let config = BuildConfig { resolution: 8, ..Default::default() };
        assert_eq!(config.split_threshold(), 256);

        let config = BuildConfig { split_threshold: Some(10), ..Default::default() };
        assert_eq!(config.split_threshold(), 10);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let err = BuildConfig::from_json_str(r#"{ "resolution": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(BuildConfig { resolution: 1, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BuildConfig::from_json_str(r#"{ "resolution": 4 }"#).unwrap();
        assert_eq!(config.resolution, 4);
        assert_eq!(config.max_depth, BuildConfig::default().max_depth);
        assert!(config.jitter);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = BuildConfig { resolution: 2, max_depth: 3, split_threshold: Some(5), jitter: false, seed: 7 };
        let json = config.to_json().unwrap();
        assert_eq!(BuildConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_json() {
        let err = BuildConfig::from_json_str("{ resolution: ").unwrap_err();
        assert!(matches!(err, crate::core::Error::Config(_)));
    }
}
