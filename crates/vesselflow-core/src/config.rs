//! Engine configuration and data-file loading.
//!
//! [`EngineConfig`] holds the policy knobs of the engine. The numeric noise
//! thresholds are crate constants ([`AMOUNT_EPSILON`](crate::AMOUNT_EPSILON),
//! [`RECIPE_EPSILON`](crate::RECIPE_EPSILON)), not configuration.
//!
//! With the `data-loader` feature, configs and process catalogs can be read
//! from RON, TOML or JSON, with the format detected from the file extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is outside its allowed range.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Engine configuration
// ===========================================================================

/// Policy knobs for ledger synchronization and recipe execution.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Safety ceiling on recipe fixed-point passes per step.
    pub max_recipe_passes: usize,
    /// Acceleration factor above which non-engine production is flagged.
    pub coherency_warp_threshold: f64,
    /// Acceleration factor forced when non-engine production is flagged.
    pub coherency_warp_ceiling: f64,
    /// Level at or above which a resource counts as full.
    pub level_full_threshold: f64,
    /// Level at or below which a resource counts as depleted.
    pub level_empty_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_recipe_passes: 1000,
            coherency_warp_threshold: 1000.0,
            coherency_warp_ceiling: 100.0,
            level_full_threshold: 0.9999,
            level_empty_threshold: 1e-4,
        }
    }
}

impl EngineConfig {
    /// Check that every knob is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_recipe_passes == 0 {
            return Err(ConfigError::Invalid(
                "max_recipe_passes must be at least 1".to_string(),
            ));
        }
        if !(self.coherency_warp_ceiling > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "coherency_warp_ceiling must be positive, got {}",
                self.coherency_warp_ceiling
            )));
        }
        if self.coherency_warp_ceiling > self.coherency_warp_threshold {
            return Err(ConfigError::Invalid(format!(
                "coherency_warp_ceiling ({}) exceeds coherency_warp_threshold ({})",
                self.coherency_warp_ceiling, self.coherency_warp_threshold
            )));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.level_full_threshold) || !unit.contains(&self.level_empty_threshold)
        {
            return Err(ConfigError::Invalid(
                "level thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if self.level_empty_threshold >= self.level_full_threshold {
            return Err(ConfigError::Invalid(format!(
                "level_empty_threshold ({}) must be below level_full_threshold ({})",
                self.level_empty_threshold, self.level_full_threshold
            )));
        }
        Ok(())
    }

    /// Parse and validate a config from text in the given format.
    #[cfg(feature = "data-loader")]
    pub fn from_str_as(content: &str, format: Format) -> Result<Self, ConfigError> {
        let config: Self = parse_str(content, format, "<string>")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file, detecting the format from its
    /// extension.
    #[cfg(feature = "data-loader")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `source_name` only labels
/// errors.
#[cfg(feature = "data-loader")]
pub fn parse_str<T: serde::de::DeserializeOwned>(
    content: &str,
    format: Format,
    source_name: &str,
) -> Result<T, ConfigError> {
    let parse_err = |detail: String| ConfigError::Parse {
        source_name: source_name.to_string(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read a file and deserialize it according to its extension.
#[cfg(feature = "data-loader")]
pub fn load_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, format, &path.display().to_string())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_passes_rejected() {
        let config = EngineConfig {
            max_recipe_passes: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ceiling_above_threshold_rejected() {
        let config = EngineConfig {
            coherency_warp_threshold: 10.0,
            coherency_warp_ceiling: 50.0,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"), "got: {err}");
    }

    #[test]
    fn inverted_level_thresholds_rejected() {
        let config = EngineConfig {
            level_full_threshold: 0.1,
            level_empty_threshold: 0.5,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nan_ceiling_rejected() {
        let config = EngineConfig {
            coherency_warp_ceiling: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn detect_known_extensions() {
        assert_eq!(detect_format(Path::new("a/engine.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("engine.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("engine.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_unknown_extension_fails() {
        let err = detect_format(Path::new("engine.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[cfg(feature = "data-loader")]
    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = EngineConfig::from_str_as(
            "coherency_warp_threshold = 500.0\ncoherency_warp_ceiling = 50.0\n",
            Format::Toml,
        )
        .unwrap();
        assert_eq!(config.coherency_warp_threshold, 500.0);
        assert_eq!(config.coherency_warp_ceiling, 50.0);
        assert_eq!(config.max_recipe_passes, 1000);
    }

    #[cfg(feature = "data-loader")]
    #[test]
    fn ron_and_json_parse() {
        let ron = EngineConfig::from_str_as("(max_recipe_passes: 8)", Format::Ron).unwrap();
        assert_eq!(ron.max_recipe_passes, 8);

        let json =
            EngineConfig::from_str_as(r#"{"level_empty_threshold": 0.01}"#, Format::Json).unwrap();
        assert_eq!(json.level_empty_threshold, 0.01);
    }

    #[cfg(feature = "data-loader")]
    #[test]
    fn parse_error_names_source() {
        let err = EngineConfig::from_str_as("max_recipe_passes = [", Format::Toml).unwrap_err();
        match err {
            ConfigError::Parse { source_name, .. } => assert_eq!(source_name, "<string>"),
            other => panic!("expected Parse, got: {other:?}"),
        }
    }

    #[cfg(feature = "data-loader")]
    #[test]
    fn loaded_config_is_validated() {
        let err = EngineConfig::from_str_as("max_recipe_passes = 0", Format::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
