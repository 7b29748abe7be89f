//! Reader configuration
//!
//! Settings are plain serde structs with defaults so a partial JSON file
//! only needs to name the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default longest thumbnail edge, in pixels
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

/// Order in which panes of the same row are read
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    /// Western comics
    #[default]
    Ltr,
    /// Manga
    Rtl,
}

/// Gutter detection parameters
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Smallest pane allowed, as a fraction of the page area
    /// - Splits that would leave a smaller region are rejected
    /// - Range (0.0, 1.0]
    pub min_region_area_fraction: f64,

    /// Largest luma variance (0-255 scale, squared) a row or column may have
    /// and still count as part of a gutter
    /// - Higher values also accept noisy or textured bands, so more splits
    /// - Lower values split less eagerly on textured paper
    /// - 0.0 only accepts perfectly flat bands
    pub gutter_variance_threshold: f64,

    /// Secondary sort axis, and therefore navigation order
    pub reading_direction: ReadingDirection,

    /// Thinnest band (in lines) accepted as a gutter
    pub min_gutter_thickness: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_region_area_fraction: 0.02,
            gutter_variance_threshold: 16.0,
            reading_direction: ReadingDirection::Ltr,
            min_gutter_thickness: 3,
        }
    }
}

impl SegmenterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.min_region_area_fraction;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "min_region_area_fraction must be in (0, 1], got {fraction}"
            )));
        }
        let threshold = self.gutter_variance_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gutter_variance_threshold must be a non-negative number, got {threshold}"
            )));
        }
        if self.min_gutter_thickness == 0 {
            return Err(ConfigError::Invalid(
                "min_gutter_thickness must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a page needs to know about how it is displayed
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ReaderConfig {
    pub segmenter: SegmenterConfig,

    /// Longest edge of thumbnails handed to the viewer
    pub thumbnail_max_dimension: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            thumbnail_max_dimension: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl ReaderConfig {
    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.segmenter.validate()?;
        if self.thumbnail_max_dimension == 0 {
            return Err(ConfigError::Invalid(
                "thumbnail_max_dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
