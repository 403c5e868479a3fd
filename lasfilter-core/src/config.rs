//! Processing configuration.

use std::fmt;
use thiserror::Error;

/// Lowest accepted `points_to_render` value.
pub const MIN_POINTS_TO_RENDER: f64 = 10.0;
/// Highest accepted `points_to_render` value.
pub const MAX_POINTS_TO_RENDER: f64 = 100.0;

/// Errors raised by configuration parsing and validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid output format {0:?}, use .las, .txt or .csv")]
    InvalidFormat(String),

    #[error("points_to_render must be between 10.0 and 100.0, got {0}")]
    PointsToRenderOutOfRange(f64),
}

/// Serialization of the processed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// LAS container
    #[default]
    Las,
    /// Space separated text
    Text,
    /// Comma separated values with a header line
    Csv,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Las => "las",
            Self::Text => "txt",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    /// Parses ".las", ".txt" or ".csv". The leading dot is optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let ext = trimmed.strip_prefix('.').unwrap_or(trimmed);
        match ext.to_ascii_lowercase().as_str() {
            "las" => Ok(Self::Las),
            "txt" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.extension())
    }
}

/// What bounding extents a filtered container declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtentPolicy {
    /// Keep the source header's extents, even if they no longer match.
    #[default]
    Preserve,
    /// Write the extents of the retained points.
    Recompute,
}

/// Settings for one processing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessingConfig {
    pub output_format: OutputFormat,
    /// Height percentile (10-100) used to derive the Z threshold
    pub points_to_render: f64,
    pub extents: ExtentPolicy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Las,
            points_to_render: MIN_POINTS_TO_RENDER,
            extents: ExtentPolicy::Preserve,
        }
    }
}

impl ProcessingConfig {
    pub fn new(output_format: OutputFormat, points_to_render: f64) -> Self {
        Self {
            output_format,
            points_to_render,
            ..Self::default()
        }
    }

    pub fn with_extents(self, extents: ExtentPolicy) -> Self {
        Self { extents, ..self }
    }

    /// Checks the range collaborators are expected to enforce.
    ///
    /// [`crate::process`] does not call this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (MIN_POINTS_TO_RENDER..=MAX_POINTS_TO_RENDER).contains(&self.points_to_render) {
            Ok(())
        } else {
            Err(ConfigError::PointsToRenderOutOfRange(self.points_to_render))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str(".las").unwrap(), OutputFormat::Las);
        assert_eq!(OutputFormat::from_str("txt").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str(" .CSV ").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str(".laz").is_err());
        assert!(OutputFormat::from_str("").is_err());
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), ".txt");
        assert_eq!(OutputFormat::Las.extension(), "las");
    }

    #[test]
    fn test_defaults() {
        let config = ProcessingConfig::default();
        assert_eq!(config.output_format, OutputFormat::Las);
        assert_eq!(config.points_to_render, 10.0);
        assert_eq!(config.extents, ExtentPolicy::Preserve);
    }

    #[test]
    fn test_validate_range() {
        assert!(ProcessingConfig::new(OutputFormat::Las, 10.0).validate().is_ok());
        assert!(ProcessingConfig::new(OutputFormat::Las, 100.0).validate().is_ok());
        assert_eq!(
            ProcessingConfig::new(OutputFormat::Las, 9.5).validate(),
            Err(ConfigError::PointsToRenderOutOfRange(9.5))
        );
        assert!(ProcessingConfig::new(OutputFormat::Las, f64::NAN)
            .validate()
            .is_err());
    }
}
