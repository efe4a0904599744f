//! Ordinary least squares on the period index.
//!
//! The interval is a fixed ±10% band around the point prediction. It is an
//! approximation for display, not a statistical interval.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    ensure_horizon, ensure_trainable, timeline, ForecastBackend, ForecastRow, ModelKind,
    TrainedModel,
};
use crate::errors::{ForecastError, Result};
use crate::forecast::aggregate::AggregatedSeries;
use crate::ledger::Frequency;

/// Half-width of the band relative to the prediction.
pub const BAND_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCoefficients {
    pub intercept: f64,
    pub slope: f64,
}

/// `value ≈ intercept + slope · i`, with `i` counted from `training_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: LinearCoefficients,
    pub training_start: NaiveDate,
    pub training_length: usize,
    pub frequency: Frequency,
}

impl LinearModel {
    pub fn fit(series: &AggregatedSeries) -> Result<Self> {
        let training_start = ensure_trainable(series)?;
        let values = series.values();
        let n = values.len() as f64;

        let mean_x = (n - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / n;
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (index, value) in values.iter().enumerate() {
            let dx = index as f64 - mean_x;
            sxx += dx * dx;
            sxy += dx * (value - mean_y);
        }
        if sxx <= 0.0 {
            return Err(ForecastError::NumericalError(
                "degenerate period index in linear fit".into(),
            ));
        }
        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(ForecastError::NumericalError(
                "linear fit produced non-finite coefficients".into(),
            ));
        }

        Ok(Self {
            coefficients: LinearCoefficients { intercept, slope },
            training_start,
            training_length: values.len(),
            frequency: series.frequency(),
        })
    }

    pub fn value_at(&self, index: f64) -> f64 {
        self.coefficients.intercept + self.coefficients.slope * index
    }

    /// Rows for indices `0..training_length + horizon`.
    pub fn predict(&self, horizon: usize, frequency: Frequency) -> Result<Vec<ForecastRow>> {
        ensure_horizon(horizon)?;
        let count = self.training_length + horizon;
        let stamps = timeline(self.training_start, count, frequency)?;
        Ok(stamps
            .into_iter()
            .enumerate()
            .map(|(index, timestamp)| {
                let predicted = self.value_at(index as f64);
                let margin = BAND_RATIO * predicted.abs();
                ForecastRow {
                    timestamp,
                    predicted,
                    lower: predicted - margin,
                    upper: predicted + margin,
                }
            })
            .collect())
    }
}

/// Always-available fallback engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearBackend;

impl LinearBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ForecastBackend for LinearBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn is_available(&self) -> bool {
        true
    }

    fn train(&self, series: &AggregatedSeries) -> Result<TrainedModel> {
        let model = LinearModel::fit(series)?;
        debug!(
            periods = model.training_length,
            slope = model.coefficients.slope,
            intercept = model.coefficients.intercept,
            "fitted linear model"
        );
        Ok(TrainedModel::Linear(model))
    }

    fn predict(
        &self,
        model: &TrainedModel,
        horizon: usize,
        frequency: Frequency,
    ) -> Result<Vec<ForecastRow>> {
        match model {
            TrainedModel::Linear(model) => model.predict(horizon, frequency),
            other => Err(ForecastError::InvalidInput(format!(
                "linear backend cannot predict with a {} model",
                other.kind()
            ))),
        }
    }
}
