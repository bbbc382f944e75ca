use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{error::Result, video::types::Frame};

/// Core trait that all photographic filters implement
///
/// Filters are shared between threads and must not keep per-frame state:
/// everything that varies comes in through the frame and the immutable
/// [`FilterConfig`].
pub trait Filter: Send + Sync {
    /// Returns the unique name of this filter
    fn name(&self) -> &str;

    /// Returns a human-readable description of this filter
    fn description(&self) -> &str;

    /// Produce the filtered version of a frame
    ///
    /// # Returns
    ///
    /// `Ok(Some(frame))` with the filtered frame, `Ok(None)` when the filter has
    /// no output for this input, or an error if processing failed.
    fn apply(&self, frame: &Frame, config: &FilterConfig) -> Result<Option<Frame>>;

    /// Get the default configuration for this filter
    fn default_config(&self) -> FilterConfig {
        FilterConfig::default()
    }

    /// Validate that the given configuration is valid for this filter
    ///
    /// Called once when the pipeline is built, never per frame.
    fn validate_config(&self, config: &FilterConfig) -> Result<()> {
        let _ = config;
        Ok(())
    }

    /// Get filter-specific metadata
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::default()
    }
}

/// Configuration for filters
///
/// Each filter defines its own named parameters on top of a common intensity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Blend between input (0.0) and fully filtered output (1.0)
    pub intensity: f32,

    /// Filter-specific parameters
    #[serde(default)]
    pub parameters: HashMap<String, ConfigValue>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            parameters: HashMap::new(),
        }
    }
}

impl FilterConfig {
    /// Create a new config with the given intensity
    pub fn with_intensity(intensity: f32) -> Self {
        Self {
            intensity: intensity.clamp(0.0, 1.0),
            parameters: HashMap::new(),
        }
    }

    /// Set a parameter value
    pub fn set<K: Into<String>, V: Into<ConfigValue>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.parameters.get(key).and_then(|v| v.as_f32())
    }

    pub fn get_f32_or(&self, key: &str, default: f32) -> f32 {
        self.get_f32(key).unwrap_or(default)
    }

    /// Defaults from `base` for every parameter this config does not set
    pub fn merged_over(&self, base: &FilterConfig) -> FilterConfig {
        let mut parameters = base.parameters.clone();
        parameters.extend(self.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        FilterConfig {
            intensity: self.intensity,
            parameters,
        }
    }
}

/// Numeric filter parameter, written as either a float or an integer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Float(f32),
    Integer(i32),
}

impl ConfigValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f32),
        }
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value)
    }
}

/// Metadata about a filter's cost and parameters
#[derive(Debug, Clone, Default)]
pub struct FilterMetadata {
    /// Estimated per-frame cost (0.0 = minimal, 1.0 = heavy)
    pub performance_impact: f32,

    /// List of optional parameters with descriptions
    pub optional_parameters: Vec<(String, String)>,
}

/// Linear blend of two channel values, `t` in 0..=1
pub(crate) fn mix(a: u8, b: f32, t: f32) -> u8 {
    (a as f32 * (1.0 - t) + b * t).round().clamp(0.0, 255.0) as u8
}
