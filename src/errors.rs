use std::result::Result as StdResult;

use thiserror::Error;

use crate::config::ConfigError;
use crate::forecast::backend::ModelKind;

/// Unified error type for aggregation, training, prediction and storage.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("no expense data available")]
    EmptyInput,
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),
    #[error("Invalid horizon: {0} (expected 1 to {} periods)", crate::forecast::MAX_PERIODS)]
    InvalidHorizon(i64),
    #[error("Insufficient data: need at least {required} periods, found {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(ModelKind),
    #[error("Unknown model type: {0}")]
    UnknownModel(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Numerical error: {0}")]
    NumericalError(String),
    #[error("Persistence error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = StdResult<T, ForecastError>;

impl ForecastError {
    /// True for errors caused by malformed request parameters.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ForecastError::InvalidFrequency(_)
                | ForecastError::InvalidHorizon(_)
                | ForecastError::UnknownModel(_)
                | ForecastError::InvalidInput(_)
        )
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::StorageError(err.to_string())
    }
}

impl From<ConfigError> for ForecastError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(io) => ForecastError::StorageError(io.to_string()),
            ConfigError::Serde(message) | ConfigError::Invalid(message) => {
                ForecastError::ConfigError(message)
            }
        }
    }
}
