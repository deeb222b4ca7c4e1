use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::ApexError;
use crate::coaching::CoachingConfig;
use crate::corners::{DetectionConfig, ReconcileConfig};
use crate::scoring::ScoringConfig;
use crate::telemetry::LapSelection;

const CONFIG_DIR_NAME: &str = "apexline";
const CONFIG_FILE_NAME: &str = "config.json";

/// Settings for one analysis run. Every section falls back to its defaults
/// when missing from the config file.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub lap_selection: LapSelection,
    pub detection: DetectionConfig,
    pub reconcile: ReconcileConfig,
    pub scoring: ScoringConfig,
    pub coaching: CoachingConfig,
}

impl AnalysisConfig {
    pub fn default_path() -> Result<PathBuf, ApexError> {
        Ok(dirs::config_dir()
            .ok_or(ApexError::NoConfigDir)?
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME))
    }

    /// Load the user config file if there is one.
    pub fn from_local_file() -> Result<Option<Self>, ApexError> {
        let config_path = match dirs::config_dir() {
            Some(dir) => dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            None => return Ok(None),
        };
        if !config_path.exists() {
            debug!("No config file at {:?}", config_path);
            return Ok(None);
        }
        Self::from_path(&config_path).map(Some)
    }

    pub fn from_path(config_path: &Path) -> Result<Self, ApexError> {
        let file = std::fs::File::open(config_path)
            .map_err(|e| ApexError::ConfigIOError { source: e })?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| ApexError::ConfigSerializeError { source: e })?;
        config.validate()?;
        info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ApexError> {
        let config_path = Self::default_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ApexError> {
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ApexError::ConfigIOError { source: e })?;
            }
        }
        let file = std::fs::File::create(config_path)
            .map_err(|e| ApexError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| ApexError::ConfigSerializeError { source: e })
    }

    pub fn validate(&self) -> Result<(), ApexError> {
        let detection = &self.detection;
        if detection.exit_lateral_g <= 0.0 || detection.exit_lateral_g > detection.entry_lateral_g
        {
            return Err(ApexError::InvalidConfig {
                field: "detection.exit_lateral_g".to_string(),
                reason: "must be positive and not above entry_lateral_g".to_string(),
            });
        }
        if detection.min_corner_samples < 1 {
            return Err(ApexError::InvalidConfig {
                field: "detection.min_corner_samples".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let reconcile = &self.reconcile;
        if !(0.0..=0.5).contains(&reconcile.distance_tolerance_fraction)
            || reconcile.min_distance_tolerance_m < 0.0
        {
            return Err(ApexError::InvalidConfig {
                field: "reconcile".to_string(),
                reason: "tolerance fraction must be in [0, 0.5] and the minimum tolerance non-negative"
                    .to_string(),
            });
        }
        if self.scoring.friction_coefficient <= 0.0 || self.scoring.max_braking_decel_g <= 0.0 {
            return Err(ApexError::InvalidConfig {
                field: "scoring".to_string(),
                reason: "friction coefficient and braking deceleration must be positive"
                    .to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_round_trips_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = AnalysisConfig::default();
        config.lap_selection.max_lap_time_s = Some(50.0);
        config.coaching.max_items = 3;
        config.save_to(&path).unwrap();

        let loaded = AnalysisConfig::from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"lap_selection":{"max_lap_time_s":48.5}}"#).unwrap();

        let loaded = AnalysisConfig::from_path(&path).unwrap();
        assert_eq!(loaded.lap_selection.max_lap_time_s, Some(48.5));
        assert_eq!(loaded.detection, DetectionConfig::default());
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let mut config = AnalysisConfig::default();
        config.detection.exit_lateral_g = config.detection.entry_lateral_g + 0.1;
        assert!(matches!(
            config.validate(),
            Err(ApexError::InvalidConfig { .. })
        ));
    }
}
