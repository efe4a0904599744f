//! Response shapes for a forecasting run and the in-sample backtest.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::aggregate::AggregatedSeries;
use super::backend::{ForecastRow, ModelKind};
use crate::errors::{ForecastError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
}

/// A successful forecast. Only `forecast` and `metrics` reach the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub forecast: Vec<ForecastRow>,
    pub metrics: Metrics,
    #[serde(skip)]
    pub backend: ModelKind,
    #[serde(skip)]
    pub model_name: String,
    /// The requested backend was unavailable and the fallback ran instead.
    #[serde(skip)]
    pub degraded: bool,
    /// The model was fitted during this run rather than loaded.
    #[serde(skip)]
    pub trained: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    NoData,
    Forecast(ForecastReport),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ForecastResponse<'a> {
    Forecast {
        forecast: &'a [ForecastRow],
        metrics: &'a Metrics,
    },
    Error {
        error: String,
    },
}

impl ForecastOutcome {
    pub fn report(&self) -> Option<&ForecastReport> {
        match self {
            ForecastOutcome::Forecast(report) => Some(report),
            ForecastOutcome::NoData => None,
        }
    }

    pub fn response(&self) -> ForecastResponse<'_> {
        match self {
            ForecastOutcome::Forecast(report) => ForecastResponse::Forecast {
                forecast: &report.forecast,
                metrics: &report.metrics,
            },
            ForecastOutcome::NoData => ForecastResponse::Error {
                error: ForecastError::EmptyInput.to_string(),
            },
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.response())?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.response())?)
    }
}

/// Mean absolute error over rows whose timestamp also appears in `actual`.
///
/// This scores the model against its own training data, so it measures fit
/// rather than out-of-sample accuracy.
pub fn backtest(actual: &AggregatedSeries, rows: &[ForecastRow]) -> Metrics {
    let predicted: HashMap<NaiveDate, f64> = rows
        .iter()
        .map(|row| (row.timestamp, row.predicted))
        .collect();
    let errors: Vec<f64> = actual
        .points()
        .iter()
        .filter_map(|point| {
            predicted
                .get(&point.timestamp)
                .map(|value| (point.total - value).abs())
        })
        .collect();
    Metrics {
        mae: mean_absolute_error(&errors),
    }
}

fn mean_absolute_error(errors: &[f64]) -> Option<f64> {
    if errors.is_empty() {
        None
    } else {
        Some(errors.iter().sum::<f64>() / errors.len() as f64)
    }
}
