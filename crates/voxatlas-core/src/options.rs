//! Configuration options for voxatlas.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::merge::MergeMode;

/// Editing configuration for a volume document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Manual brush settings.
    pub brush: BrushOptions,

    /// Region growing after each stroke. Disabled when `None`.
    pub smart_brush: Option<SmartBrushOptions>,

    /// Whether orthogonal slice reads are cached until the next write.
    pub slice_cache: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            brush: BrushOptions::default(),
            smart_brush: None,
            slice_cache: true,
        }
    }
}

impl Options {
    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the options as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads options from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let options = Self::from_json(&text)?;
        log::debug!("loaded options from {}", path.display());
        Ok(options)
    }
}

/// Settings for the manual paint brush.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushOptions {
    /// Circle radius in voxels. Zero paints single voxels.
    pub radius: u32,

    /// Value written into every component of a painted voxel.
    pub value: f64,

    /// How painted values combine with existing ones.
    pub merge: MergeMode,

    /// Whether finished strokes emit undo records.
    pub track_undo: bool,
}

impl Default for BrushOptions {
    fn default() -> Self {
        Self {
            radius: 2,
            value: 1.0,
            merge: MergeMode::Replace,
            track_undo: true,
        }
    }
}

/// Intensity thresholds for the smart brush.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmartBrushOptions {
    /// Margin added around the seed intensity range.
    pub seed_threshold: f64,

    /// Maximum (exclusive) intensity step between adjacent accepted voxels.
    pub neighbor_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.brush.radius, 2);
        assert_eq!(options.brush.merge, MergeMode::Replace);
        assert!(options.brush.track_undo);
        assert!(options.smart_brush.is_none());
        assert!(options.slice_cache);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let options = Options::from_json(
            r#"{ "brush": { "radius": 5, "merge": "Max" },
                 "smart_brush": { "seed_threshold": 10.0, "neighbor_threshold": 5.0 } }"#,
        )
        .unwrap();
        assert_eq!(options.brush.radius, 5);
        assert_eq!(options.brush.merge, MergeMode::Max);
        assert!((options.brush.value - 1.0).abs() < f64::EPSILON);
        assert_eq!(
            options.smart_brush,
            Some(SmartBrushOptions {
                seed_threshold: 10.0,
                neighbor_threshold: 5.0
            })
        );
        assert!(options.slice_cache);
    }

    #[test]
    fn test_json_round_trip() {
        let mut options = Options::default();
        options.slice_cache = false;
        options.brush.value = 3.0;
        let json = options.to_json().unwrap();
        assert_eq!(Options::from_json(&json).unwrap(), options);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            Options::from_json("{ not json"),
            Err(crate::AtlasError::JsonError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Options::load("/nonexistent/voxatlas.json"),
            Err(crate::AtlasError::IoError(_))
        ));
    }
}
