//! Configuration types for mask preview and object removal jobs

use crate::error::{MaskError, Result};
use crate::types::{Coordinates, ObjectMask};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Detection sliders exposed by the configuration panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSettings {
    /// Color similarity tolerance, fraction of the maximum RGB distance (0.1-0.8)
    pub sensitivity: f32,
    /// Sobel magnitude threshold (0-100, 0 disables the edge merge)
    pub edge_threshold: u8,
    /// Box blur iterations applied to the fill mask (0-5)
    pub smoothing: u8,
}

impl DetectionSettings {
    pub const MIN_SENSITIVITY: f32 = 0.1;
    pub const MAX_SENSITIVITY: f32 = 0.8;
    pub const MAX_EDGE_THRESHOLD: u8 = 100;
    pub const MAX_SMOOTHING: u8 = 5;

    /// Create a new settings builder
    #[must_use]
    pub fn builder() -> DetectionSettingsBuilder {
        DetectionSettingsBuilder::new()
    }

    /// Validate all slider values against their ranges
    pub fn validate(&self) -> Result<()> {
        if !self.sensitivity.is_finite()
            || !(Self::MIN_SENSITIVITY..=Self::MAX_SENSITIVITY).contains(&self.sensitivity)
        {
            return Err(MaskError::config_value_error(
                "sensitivity",
                self.sensitivity,
                "0.1-0.8",
                Some(0.3),
            ));
        }

        if self.edge_threshold > Self::MAX_EDGE_THRESHOLD {
            return Err(MaskError::config_value_error(
                "edge threshold",
                self.edge_threshold,
                "0-100",
                Some(50),
            ));
        }

        if self.smoothing > Self::MAX_SMOOTHING {
            return Err(MaskError::config_value_error(
                "smoothing",
                self.smoothing,
                "0-5",
                Some(2),
            ));
        }

        Ok(())
    }

    /// Whether the edge map should be merged into the mask
    #[must_use]
    pub fn edges_enabled(&self) -> bool {
        self.edge_threshold > 0
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            sensitivity: 0.3,
            edge_threshold: 50,
            smoothing: 2,
        }
    }
}

/// Builder for `DetectionSettings`; out-of-range values are clamped
pub struct DetectionSettingsBuilder {
    settings: DetectionSettings,
}

impl DetectionSettingsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            settings: DetectionSettings::default(),
        }
    }

    #[must_use]
    pub fn sensitivity(mut self, sensitivity: f32) -> Self {
        self.settings.sensitivity = if sensitivity.is_finite() {
            sensitivity.clamp(
                DetectionSettings::MIN_SENSITIVITY,
                DetectionSettings::MAX_SENSITIVITY,
            )
        } else {
            DetectionSettings::default().sensitivity
        };
        self
    }

    #[must_use]
    pub fn edge_threshold(mut self, threshold: u8) -> Self {
        self.settings.edge_threshold = threshold.min(DetectionSettings::MAX_EDGE_THRESHOLD);
        self
    }

    #[must_use]
    pub fn smoothing(mut self, iterations: u8) -> Self {
        self.settings.smoothing = iterations.min(DetectionSettings::MAX_SMOOTHING);
        self
    }

    pub fn build(self) -> Result<DetectionSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

impl Default for DetectionSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// How the detected mask is drawn over the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Outline of the mask only
    #[default]
    Contour,
    /// Whole mask region filled
    Box,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contour => write!(f, "contour"),
            Self::Box => write!(f, "box"),
        }
    }
}

/// Removal method reported to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemovalMethod {
    #[default]
    BoundingBox,
    PreciseMask,
}

/// Inpainting quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quality {
    /// Standard inpainting, no token cost
    #[default]
    Free,
    /// High-quality AI inpainting
    Premium,
}

impl Quality {
    /// Tokens charged for a job at this tier
    #[must_use]
    pub fn token_cost(self) -> u32 {
        match self {
            Self::Free => 0,
            Self::Premium => 1,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Free => "Standard Quality",
            Self::Premium => "Premium Quality",
        }
    }
}

/// Object removal configuration handed to the parent form and sent with the job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRemovalConfig {
    pub method: RemovalMethod,

    /// Selection in original-image pixel space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,

    /// Only present for `PRECISE_MASK`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<ObjectMask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_settings: Option<DetectionSettings>,
}

impl Default for ObjectRemovalConfig {
    fn default() -> Self {
        Self {
            method: RemovalMethod::BoundingBox,
            coordinates: None,
            quality: Some(Quality::Free),
            mask: None,
            detection_settings: None,
        }
    }
}

impl ObjectRemovalConfig {
    /// Tokens this job will cost
    #[must_use]
    pub fn token_cost(&self) -> u32 {
        self.quality.map_or(0, Quality::token_cost)
    }

    /// Check the config is consistent enough to submit
    pub fn validate(&self) -> Result<()> {
        match self.method {
            RemovalMethod::PreciseMask if self.mask.is_none() => Err(MaskError::invalid_config(
                "PRECISE_MASK requires a detected mask",
            )),
            _ if self.coordinates.is_none() => Err(MaskError::invalid_selection(
                "no object has been selected",
            )),
            _ => {
                if let Some(settings) = &self.detection_settings {
                    settings.validate()?;
                }
                Ok(())
            }
        }
    }

    /// Serialize the job request body
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize as a JSON value for embedding in a larger request
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Session-level configuration for the preview panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Detection sliders
    pub settings: DetectionSettings,

    /// Overlay view mode
    pub view_mode: ViewMode,

    /// Minimum side length (canvas px) for a drag to trigger detection
    pub min_selection_side: f64,

    /// Quiet period before a burst of resizes re-initializes the canvas
    #[serde(with = "duration_ms")]
    pub resize_debounce: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            settings: DetectionSettings::default(),
            view_mode: ViewMode::default(),
            min_selection_side: 5.0,
            resize_debounce: Duration::from_millis(100),
        }
    }
}

impl PreviewConfig {
    #[must_use]
    pub fn builder() -> PreviewConfigBuilder {
        PreviewConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        if !self.min_selection_side.is_finite() || self.min_selection_side < 1.0 {
            return Err(MaskError::config_value_error(
                "minimum selection side",
                self.min_selection_side,
                ">= 1.0",
                Some(5.0),
            ));
        }
        Ok(())
    }
}

/// Builder for `PreviewConfig`
pub struct PreviewConfigBuilder {
    config: PreviewConfig,
}

impl PreviewConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PreviewConfig::default(),
        }
    }

    #[must_use]
    pub fn settings(mut self, settings: DetectionSettings) -> Self {
        self.config.settings = settings;
        self
    }

    #[must_use]
    pub fn view_mode(mut self, view_mode: ViewMode) -> Self {
        self.config.view_mode = view_mode;
        self
    }

    #[must_use]
    pub fn min_selection_side(mut self, side: f64) -> Self {
        self.config.min_selection_side = side;
        self
    }

    #[must_use]
    pub fn resize_debounce(mut self, debounce: Duration) -> Self {
        self.config.resize_debounce = debounce;
        self
    }

    pub fn build(self) -> Result<PreviewConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for PreviewConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_default_settings_match_panel_defaults() {
        let settings = DetectionSettings::default();
        assert!((settings.sensitivity - 0.3).abs() < f32::EPSILON);
        assert_eq!(settings.edge_threshold, 50);
        assert_eq!(settings.smoothing, 2);
        assert!(settings.validate().is_ok());
        assert!(settings.edges_enabled());
    }

    #[test]
    fn test_builder_clamps_slider_values() {
        let settings = DetectionSettings::builder()
            .sensitivity(2.0)
            .edge_threshold(250)
            .smoothing(9)
            .build()
            .unwrap();
        assert!((settings.sensitivity - 0.8).abs() < f32::EPSILON);
        assert_eq!(settings.edge_threshold, 100);
        assert_eq!(settings.smoothing, 5);

        let settings = DetectionSettings::builder()
            .sensitivity(f32::NAN)
            .build()
            .unwrap();
        assert!((settings.sensitivity - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut settings = DetectionSettings::default();
        settings.sensitivity = 0.05;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("sensitivity"));
        assert!(err.to_string().contains("0.1-0.8"));

        let mut settings = DetectionSettings::default();
        settings.smoothing = 6;
        assert!(settings.validate().is_err());

        let mut settings = DetectionSettings::default();
        settings.edge_threshold = 101;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_serialize_with_camel_case_keys() {
        let json = serde_json::to_value(DetectionSettings::default()).unwrap();
        assert_eq!(json["edgeThreshold"], 50);
        assert_eq!(json["smoothing"], 2);
    }

    #[test]
    fn test_default_config_is_bounding_box_free() {
        let config = ObjectRemovalConfig::default();
        assert_eq!(config.method, RemovalMethod::BoundingBox);
        assert_eq!(config.quality, Some(Quality::Free));
        assert_eq!(config.token_cost(), 0);

        let json = config.to_json_value().unwrap();
        assert_eq!(json["method"], "BOUNDING_BOX");
        assert_eq!(json["quality"], "FREE");
        assert!(json.get("coordinates").is_none());
        assert!(json.get("mask").is_none());
    }

    #[test]
    fn test_premium_quality_costs_one_token() {
        let config = ObjectRemovalConfig {
            quality: Some(Quality::Premium),
            ..Default::default()
        };
        assert_eq!(config.token_cost(), 1);
        assert_eq!(Quality::Premium.label(), "Premium Quality");
    }

    #[test]
    fn test_precise_mask_payload_round_trip() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(1, 1, Rgba([255, 100, 100, 150]));
        let config = ObjectRemovalConfig {
            method: RemovalMethod::PreciseMask,
            coordinates: Some(Coordinates {
                x: 4,
                y: 6,
                width: 20,
                height: 10,
            }),
            quality: Some(Quality::Premium),
            mask: Some(ObjectMask::new(image)),
            detection_settings: Some(DetectionSettings::default()),
        };
        assert!(config.validate().is_ok());

        let json = config.to_json().unwrap();
        assert!(json.contains("\"PRECISE_MASK\""));
        assert!(json.contains("\"detectionSettings\""));

        let parsed = ObjectRemovalConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_validation_requires_selection() {
        let config = ObjectRemovalConfig::default();
        assert!(matches!(
            config.validate(),
            Err(MaskError::InvalidSelection(_))
        ));

        let config = ObjectRemovalConfig {
            method: RemovalMethod::PreciseMask,
            coordinates: Some(Coordinates::default()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MaskError::InvalidConfig(_))));
    }

    #[test]
    fn test_preview_config_builder() {
        let config = PreviewConfig::builder()
            .view_mode(ViewMode::Box)
            .min_selection_side(8.0)
            .resize_debounce(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(config.view_mode, ViewMode::Box);
        assert_eq!(config.resize_debounce, Duration::from_millis(250));

        assert!(PreviewConfig::builder().min_selection_side(0.0).build().is_err());

        let json = serde_json::to_value(PreviewConfig::default()).unwrap();
        assert_eq!(json["resize_debounce"], 100);
        assert_eq!(json["view_mode"], "contour");
    }
}
