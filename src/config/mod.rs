//! Application configuration
//!
//! A single immutable [`AppConfig`] is loaded at startup and handed to every
//! component constructor. Nothing reads configuration from global state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filters::FilterKind;

/// Tunables for the concrete filter implementations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Gaussian kernel size for the blur filter (odd, in pixels)
    pub blur_kernel: u32,
    /// Canny low hysteresis threshold
    pub canny_low: f32,
    /// Canny high hysteresis threshold
    pub canny_high: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            blur_kernel: 51,
            canny_low: 100.0,
            canny_high: 200.0,
        }
    }
}

impl FilterParams {
    /// Gaussian sigma for the configured kernel size.
    ///
    /// Same rule OpenCV uses when a kernel size is given with sigma 0.
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel.max(1) as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }
}

/// Static application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Minimum presence score for a newly detected hand
    pub min_detection_confidence: f32,
    /// Minimum presence score to keep tracking a hand from the previous frame
    pub min_tracking_confidence: f32,
    /// Maximum number of hands reported per frame
    pub max_hands: usize,
    /// Thumb-tip distance (pixels) a gesture must exceed to form a region
    pub gesture_distance_threshold: f32,
    /// Seconds between automatic filter changes
    pub auto_advance_interval: f64,
    /// Outline colour (RGB)
    pub overlay_color: [u8; 3],
    /// Outline stroke thickness in pixels (0 disables the outline)
    pub overlay_thickness: u32,
    /// Ordered filter names, cycled by index
    pub filters: Vec<String>,
    /// Filter tunables
    pub filter_params: FilterParams,
    /// Camera to open
    pub camera_index: u32,
    /// Requested capture width
    pub capture_width: u32,
    /// Requested capture height
    pub capture_height: u32,
    /// Mirror frames horizontally before processing
    pub mirror: bool,
    /// Hand landmark ONNX model; searched in `models/` when unset
    pub model_path: Option<PathBuf>,
    /// Draw the hand skeleton on the output
    pub draw_landmarks: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
            max_hands: 2,
            gesture_distance_threshold: 50.0,
            auto_advance_interval: 5.5,
            overlay_color: [0, 255, 0],
            overlay_thickness: 3,
            filters: FilterKind::ALL.iter().map(|k| k.name().to_string()).collect(),
            filter_params: FilterParams::default(),
            camera_index: 0,
            capture_width: 1280,
            capture_height: 720,
            mirror: true,
            model_path: None,
            draw_landmarks: true,
        }
    }
}

impl AppConfig {
    /// Load and validate a JSON configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON configuration string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(ConfigError::Parse)?;
        fs::write(path, json).map_err(ConfigError::Io)
    }

    /// Check every value the core relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter_kinds()?;

        if self.max_hands == 0 {
            return Err(ConfigError::Invalid("max_hands must be at least 1".into()));
        }
        if !self.auto_advance_interval.is_finite() || self.auto_advance_interval <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "auto_advance_interval must be positive, got {}",
                self.auto_advance_interval
            )));
        }
        if !self.gesture_distance_threshold.is_finite() || self.gesture_distance_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "gesture_distance_threshold must be non-negative, got {}",
                self.gesture_distance_threshold
            )));
        }
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{} must be in 0..=1, got {}", name, value)));
            }
        }
        let kernel = self.filter_params.blur_kernel;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(ConfigError::Invalid(format!("blur_kernel must be odd, got {}", kernel)));
        }

        Ok(())
    }

    /// Resolve the configured filter names into catalog entries
    pub fn filter_kinds(&self) -> Result<Vec<FilterKind>, ConfigError> {
        if self.filters.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        self.filters
            .iter()
            .map(|name| FilterKind::from_name(name).ok_or_else(|| ConfigError::UnknownFilter(name.clone())))
            .collect()
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    UnknownFilter(String),
    EmptyCatalog,
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "JSON error: {}", e),
            ConfigError::UnknownFilter(name) => write!(f, "Unknown filter: {}", name),
            ConfigError::EmptyCatalog => write!(f, "Filter list is empty"),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_hands, 2);
        assert_eq!(config.gesture_distance_threshold, 50.0);
        assert_eq!(config.auto_advance_interval, 5.5);
        assert_eq!(config.overlay_color, [0, 255, 0]);
        assert_eq!(config.overlay_thickness, 3);
        assert_eq!(
            config.filters,
            vec!["Grayscale", "Inverted", "Blur", "Edge Detection"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AppConfig::from_json(r#"{ "auto_advance_interval": 2.0 }"#).unwrap();
        assert_eq!(config.auto_advance_interval, 2.0);
        assert_eq!(config.max_hands, 2);
        assert_eq!(config.filter_params.blur_kernel, 51);
    }

    #[test]
    fn test_unknown_filter_rejected_at_load() {
        let err = AppConfig::from_json(r#"{ "filters": ["Grayscale", "Sepia"] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFilter(ref name) if name == "Sepia"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let err = AppConfig::from_json(r#"{ "filters": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCatalog));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{ "max_hands": 0 }"#,
            r#"{ "auto_advance_interval": 0.0 }"#,
            r#"{ "gesture_distance_threshold": -1.0 }"#,
            r#"{ "min_detection_confidence": 1.5 }"#,
            r#"{ "filter_params": { "blur_kernel": 50 } }"#,
        ] {
            let err = AppConfig::from_json(json).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{} -> {}", json, err);
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(AppConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_blur_sigma_matches_opencv_rule() {
        let params = FilterParams::default();
        assert!((params.blur_sigma() - 8.0).abs() < 1e-4);

        let small = FilterParams { blur_kernel: 3, ..Default::default() };
        assert!((small.blur_sigma() - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("gesture-frame-config-{}.json", std::process::id()));
        let mut config = AppConfig::default();
        config.overlay_thickness = 5;
        config.filters = vec!["Blur".into(), "Inverted".into()];

        config.save_to_file(&path).unwrap();
        let loaded = AppConfig::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
