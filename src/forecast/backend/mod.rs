//! Interchangeable forecasting engines and the artifacts they produce.
//!
//! A backend turns an [`AggregatedSeries`] into a [`TrainedModel`]; the
//! artifact can later be asked for history-plus-horizon rows without the
//! backend that trained it.

pub mod linear;
mod lstsq;
pub mod seasonal;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{ForecastError, Result};
use crate::forecast::aggregate::AggregatedSeries;
use crate::ledger::Frequency;

pub use linear::{LinearBackend, LinearCoefficients, LinearModel};
pub use seasonal::{SeasonalBackend, SeasonalModel, SeasonalTerm};

/// Minimum number of aggregated periods either backend can learn from.
pub const MIN_TRAINING_PERIODS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Piecewise-linear trend with Fourier seasonality.
    Seasonal,
    /// Ordinary least squares on the period index.
    Linear,
}

impl ModelKind {
    /// Accepts `primary|seasonal|prophet` and `fallback|linear|lr`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" | "seasonal" | "prophet" => Ok(ModelKind::Seasonal),
            "fallback" | "linear" | "lr" => Ok(ModelKind::Linear),
            _ => Err(ForecastError::UnknownModel(value.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Seasonal => "seasonal",
            ModelKind::Linear => "linear",
        }
    }

    /// Store key used when a request does not name its model.
    pub fn default_model_name(self) -> String {
        format!("{}_expense", self.label())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One predicted period. Serializes as `{date, predicted, lower, upper}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(rename = "date")]
    pub timestamp: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A fitted model, tagged by the engine that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum TrainedModel {
    Seasonal(SeasonalModel),
    Linear(LinearModel),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::Seasonal(_) => ModelKind::Seasonal,
            TrainedModel::Linear(_) => ModelKind::Linear,
        }
    }

    pub fn frequency(&self) -> Frequency {
        match self {
            TrainedModel::Seasonal(model) => model.frequency,
            TrainedModel::Linear(model) => model.frequency,
        }
    }

    pub fn training_length(&self) -> usize {
        match self {
            TrainedModel::Seasonal(model) => model.training_length,
            TrainedModel::Linear(model) => model.training_length,
        }
    }

    /// Fitted history followed by `horizon` future periods.
    pub fn predict(&self, horizon: usize, frequency: Frequency) -> Result<Vec<ForecastRow>> {
        match self {
            TrainedModel::Seasonal(model) => model.predict(horizon, frequency),
            TrainedModel::Linear(model) => model.predict(horizon, frequency),
        }
    }
}

/// Strategy seam between the orchestrator and a concrete engine.
pub trait ForecastBackend {
    fn kind(&self) -> ModelKind;

    fn is_available(&self) -> bool;

    fn train(&self, series: &AggregatedSeries) -> Result<TrainedModel>;

    fn predict(
        &self,
        model: &TrainedModel,
        horizon: usize,
        frequency: Frequency,
    ) -> Result<Vec<ForecastRow>>;
}

pub(crate) fn ensure_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(ForecastError::InvalidHorizon(0));
    }
    Ok(())
}

pub(crate) fn ensure_trainable(series: &AggregatedSeries) -> Result<NaiveDate> {
    match series.start() {
        Some(start) if series.len() >= MIN_TRAINING_PERIODS => Ok(start),
        _ => Err(ForecastError::InsufficientData {
            required: MIN_TRAINING_PERIODS,
            actual: series.len(),
        }),
    }
}

/// Timestamps `start + i` periods for `i` in `0..count`.
pub(crate) fn timeline(
    start: NaiveDate,
    count: usize,
    frequency: Frequency,
) -> Result<Vec<NaiveDate>> {
    let mut stamps = Vec::with_capacity(count);
    let mut current = start;
    for index in 0..count {
        if index > 0 {
            current = frequency.next(current)?;
        }
        stamps.push(current);
    }
    Ok(stamps)
}
