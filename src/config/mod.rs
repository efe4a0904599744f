//! Persistent forecasting preferences.
//!
//! The configuration lives at `<home>/config/config.json`. Missing files and
//! missing fields fall back to defaults, so older files keep loading.

use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use uuid::Uuid;

use crate::forecast::backend::ModelKind;
use crate::ledger::Frequency;
use crate::utils::paths::PathResolver;

const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// User-tunable defaults for forecast requests and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "ForecastConfig::default_periods_value")]
    pub default_periods: u32,
    #[serde(default = "ForecastConfig::default_frequency_value")]
    pub default_frequency: String,
    #[serde(default = "ForecastConfig::default_model_value")]
    pub default_model: String,
    #[serde(default = "ForecastConfig::default_z_threshold")]
    pub outlier_z_threshold: f64,
    /// Allows switching the seasonal engine off without rebuilding.
    #[serde(default = "ForecastConfig::default_primary_enabled")]
    pub primary_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
    #[serde(default = "ForecastConfig::default_backup_retention")]
    pub backup_retention: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_periods: Self::default_periods_value(),
            default_frequency: Self::default_frequency_value(),
            default_model: Self::default_model_value(),
            outlier_z_threshold: Self::default_z_threshold(),
            primary_enabled: Self::default_primary_enabled(),
            model_dir: None,
            backup_retention: Self::default_backup_retention(),
        }
    }
}

impl ForecastConfig {
    pub fn default_periods_value() -> u32 {
        7
    }

    pub fn default_frequency_value() -> String {
        "D".into()
    }

    pub fn default_model_value() -> String {
        "fallback".into()
    }

    pub fn default_z_threshold() -> f64 {
        3.0
    }

    pub fn default_primary_enabled() -> bool {
        true
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    /// Checks that the stored defaults would produce a valid request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_periods == 0 {
            return Err(ConfigError::Invalid(
                "default_periods must be at least 1".into(),
            ));
        }
        Frequency::parse(&self.default_frequency)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        ModelKind::parse(&self.default_model)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if !self.outlier_z_threshold.is_finite() || self.outlier_z_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "outlier_z_threshold must be positive, got {}",
                self.outlier_z_threshold
            )));
        }
        Ok(())
    }

    /// Directory for trained models: explicit setting, then environment, then `<base>/models`.
    pub fn resolve_model_dir(&self, base: &Path) -> PathBuf {
        if let Some(path) = &self.model_dir {
            return path.clone();
        }
        PathResolver::models_dir_in(base)
    }
}

/// Handles persistence for [`ForecastConfig`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    base: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_base_dir(PathResolver::base_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(PathResolver::config_dir_in(&base))?;
        let config_path = PathResolver::config_file_in(&base);
        Ok(Self { base, config_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<ForecastConfig, ConfigError> {
        if !self.config_path.exists() {
            return Ok(ForecastConfig::default());
        }
        let data = fs::read_to_string(&self.config_path)?;
        let config: ForecastConfig =
            serde_json::from_str(&data).map_err(|err| ConfigError::Serde(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &ForecastConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|err| ConfigError::Serde(err.to_string()))?;
        let tmp = tmp_path(&self.config_path);
        let staged = write_atomic(&tmp, &json)
            .and_then(|()| fs::rename(&tmp, &self.config_path).map_err(ConfigError::from));
        if staged.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        staged
    }

    pub fn model_dir(&self, config: &ForecastConfig) -> PathBuf {
        config.resolve_model_dir(&self.base)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let unique = Uuid::new_v4().simple();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}.{}", existing, unique, TMP_SUFFIX),
        None => format!("{}.{}", unique, TMP_SUFFIX),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), ConfigError> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        let config = manager.load().expect("load defaults");
        assert_eq!(config, ForecastConfig::default());
        assert_eq!(config.default_periods, 7);
        assert_eq!(config.default_frequency, "D");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        let config = ForecastConfig {
            default_periods: 30,
            default_frequency: "W".into(),
            default_model: "primary".into(),
            primary_enabled: false,
            ..ForecastConfig::default()
        };
        manager.save(&config).expect("save");
        assert_eq!(manager.load().expect("load"), config);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        fs::write(manager.config_path(), r#"{"default_periods": 14}"#).expect("write");
        let config = manager.load().expect("load");
        assert_eq!(config.default_periods, 14);
        assert_eq!(config.outlier_z_threshold, 3.0);
        assert!(config.primary_enabled);
    }

    #[test]
    fn invalid_defaults_are_rejected() {
        let config = ForecastConfig {
            default_frequency: "hourly".into(),
            ..ForecastConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ForecastConfig {
            outlier_z_threshold: 0.0,
            ..ForecastConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_model_dir_overrides_layout() {
        let config = ForecastConfig {
            model_dir: Some(PathBuf::from("/data/models")),
            ..ForecastConfig::default()
        };
        assert_eq!(
            config.resolve_model_dir(Path::new("/home/user/.spend_forecast")),
            PathBuf::from("/data/models")
        );
    }
}
