//! Error types for mask preview operations

use thiserror::Error;

/// Result type alias for mask preview operations
pub type Result<T> = std::result::Result<T, MaskError>;

/// Error types for mask preview operations
#[derive(Error, Debug)]
pub enum MaskError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Selection box that cannot be used for detection
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Failure inside one of the detection stages
    #[error("Detection error: {0}")]
    Detection(String),

    /// Detection job was cancelled before completion
    #[error("Detection cancelled")]
    Cancelled,

    /// JSON payload serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MaskError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new invalid selection error
    pub fn invalid_selection<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSelection(msg.into())
    }

    /// Create a new detection error
    pub fn detection<S: Into<String>>(msg: S) -> Self {
        Self::Detection(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create detection error with stage context
    pub fn detection_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Detection(format!(
            "Detection failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether the error came from a cancelled job rather than a real failure
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
