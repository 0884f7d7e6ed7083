//! Analysis settings shared by every patient-hand unit of a run.
//!
//! Settings are read from an optional TOML file and can be overridden on the command
//! line. All fields have defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// What the weighter does when no parameter varies across the candidate conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariabilityPolicy {
    /// Spread the weight evenly over every parameter present for the hand.
    #[default]
    Uniform,
    /// Abandon the unit with `InsufficientVariability`.
    Error,
}

/// How a condition's value is compared against the baseline value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementScale {
    /// `value - baseline`, in the metric's own unit.
    #[default]
    Delta,
    /// `100 * (value - baseline) / |baseline|`; undefined for a zero baseline.
    Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Blend factor between data-driven and uniform responsiveness weights, in [0, 1].
    pub shrinkage_lambda: f64,
    pub zero_variability: ZeroVariabilityPolicy,
    pub improvement_scale: ImprovementScale,
    /// Spreads at or below this value count as no variability.
    pub variability_floor: f64,
    /// Defined observations a parameter needs before its spread is estimated.
    pub min_observations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            shrinkage_lambda: 0.0,
            zero_variability: ZeroVariabilityPolicy::Uniform,
            improvement_scale: ImprovementScale::Delta,
            variability_floor: 1e-9,
            min_observations: 2,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Configuration value '{field}' = {value} is out of range; expected {expected}.")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl AnalysisConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: AnalysisConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.shrinkage_lambda) {
            return Err(ConfigError::OutOfRange {
                field: "shrinkage_lambda",
                value: self.shrinkage_lambda.to_string(),
                expected: "a number between 0 and 1",
            });
        }
        if !self.variability_floor.is_finite() || self.variability_floor < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "variability_floor",
                value: self.variability_floor.to_string(),
                expected: "a finite, non-negative number",
            });
        }
        if self.min_observations < 2 {
            return Err(ConfigError::OutOfRange {
                field: "min_observations",
                value: self.min_observations.to_string(),
                expected: "at least 2 (a spread needs two observations)",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_yields_defaults() {
        let config: AnalysisConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config: AnalysisConfig =
            toml::from_str("shrinkage_lambda = 0.1\nzero_variability = \"error\"\n").unwrap();
        assert_eq!(config.shrinkage_lambda, 0.1);
        assert_eq!(config.zero_variability, ZeroVariabilityPolicy::Error);
        assert_eq!(config.improvement_scale, ImprovementScale::Delta);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<AnalysisConfig>("lambda = 0.1").is_err());
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let config = AnalysisConfig {
            shrinkage_lambda: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "shrinkage_lambda",
                ..
            })
        ));

        let config = AnalysisConfig {
            min_observations: 1,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis.toml");
        let config = AnalysisConfig {
            shrinkage_lambda: 0.25,
            improvement_scale: ImprovementScale::Percent,
            ..AnalysisConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(AnalysisConfig::load(&path).unwrap(), config);
    }
}
