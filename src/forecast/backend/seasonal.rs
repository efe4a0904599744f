//! Piecewise-linear trend plus Fourier seasonality.
//!
//! The model is fitted in one penalized least squares solve on the scaled
//! history: time runs over `[0, 1]` across the training window and totals
//! are divided by their largest magnitude. Trend changepoints sit in the
//! first 80% of the history and their slope changes carry a ridge penalty,
//! so the trend only bends where the data insists.

use std::f64::consts::PI;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lstsq;
use super::{
    ensure_horizon, ensure_trainable, timeline, ForecastBackend, ForecastRow, ModelKind,
    TrainedModel,
};
use crate::errors::{ForecastError, Result};
use crate::forecast::aggregate::AggregatedSeries;
use crate::ledger::Frequency;

const MAX_CHANGEPOINTS: usize = 25;
const CHANGEPOINT_RANGE: f64 = 0.8;
const CHANGEPOINT_PENALTY: f64 = 0.05;
const FOURIER_PENALTY: f64 = 1e-6;
/// Two-sided 80% normal quantile.
const INTERVAL_Z: f64 = 1.2816;

/// Fourier block for one seasonal cycle. Coefficients alternate `sin, cos`
/// for harmonics `1..=order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalTerm {
    pub name: String,
    pub period: f64,
    pub order: usize,
    pub coefficients: Vec<f64>,
}

impl SeasonalTerm {
    fn features(period: f64, order: usize, index: f64) -> Vec<f64> {
        let mut features = Vec::with_capacity(order * 2);
        for harmonic in 1..=order {
            let angle = 2.0 * PI * harmonic as f64 * index / period;
            features.push(angle.sin());
            features.push(angle.cos());
        }
        features
    }

    fn value_at(&self, index: f64) -> f64 {
        Self::features(self.period, self.order, index)
            .iter()
            .zip(&self.coefficients)
            .map(|(feature, coefficient)| feature * coefficient)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalModel {
    pub training_start: NaiveDate,
    pub training_length: usize,
    pub frequency: Frequency,
    /// Totals were divided by this before fitting.
    pub scale: f64,
    pub offset: f64,
    pub base_rate: f64,
    /// Changepoint positions in scaled time.
    pub changepoints: Vec<f64>,
    pub deltas: Vec<f64>,
    pub seasonalities: Vec<SeasonalTerm>,
    /// Standard deviation of in-sample residuals, in currency units.
    pub residual_std: f64,
}

impl SeasonalModel {
    pub fn fit(series: &AggregatedSeries) -> Result<Self> {
        let training_start = ensure_trainable(series)?;
        let values = series.values();
        let n = values.len();
        let frequency = series.frequency();

        let scale = values.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let scaled: Vec<f64> = values.iter().map(|value| value / scale).collect();

        let changepoints = changepoint_positions(n);
        let cycles = seasonal_cycles(frequency, n);

        let mut penalties = vec![0.0, 0.0];
        let delta_penalty = CHANGEPOINT_PENALTY * n as f64;
        penalties.extend(std::iter::repeat(delta_penalty).take(changepoints.len()));
        for (_, _, order) in &cycles {
            penalties.extend(std::iter::repeat(FOURIER_PENALTY).take(order * 2));
        }

        let design: Vec<Vec<f64>> = (0..n)
            .map(|index| design_row(index, n, &changepoints, &cycles))
            .collect();
        let beta = lstsq::ridge(&design, &scaled, &penalties)?;

        let trend_columns = 2 + changepoints.len();
        let deltas = beta[2..trend_columns].to_vec();
        let mut seasonalities = Vec::with_capacity(cycles.len());
        let mut cursor = trend_columns;
        for (name, period, order) in cycles {
            let width = order * 2;
            seasonalities.push(SeasonalTerm {
                name: name.to_string(),
                period,
                order,
                coefficients: beta[cursor..cursor + width].to_vec(),
            });
            cursor += width;
        }

        let mut model = Self {
            training_start,
            training_length: n,
            frequency,
            scale,
            offset: beta[0],
            base_rate: beta[1],
            changepoints,
            deltas,
            seasonalities,
            residual_std: 0.0,
        };

        let residuals: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(index, value)| value - model.value_at(index))
            .collect();
        let variance = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
        if !variance.is_finite() {
            return Err(ForecastError::NumericalError(
                "seasonal fit produced non-finite residuals".into(),
            ));
        }
        model.residual_std = variance.sqrt();
        Ok(model)
    }

    fn scaled_time(&self, index: usize) -> f64 {
        scaled_time(index, self.training_length)
    }

    fn trend_at(&self, t: f64) -> f64 {
        let bends: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .map(|(position, delta)| delta * (t - position).max(0.0))
            .sum();
        self.offset + self.base_rate * t + bends
    }

    /// Model value for period `index` in currency units.
    pub fn value_at(&self, index: usize) -> f64 {
        let seasonal: f64 = self
            .seasonalities
            .iter()
            .map(|term| term.value_at(index as f64))
            .sum();
        (self.trend_at(self.scaled_time(index)) + seasonal) * self.scale
    }

    /// Fitted history followed by `horizon` future periods. Future bands
    /// widen with `sqrt(1 + steps / training_length)`.
    pub fn predict(&self, horizon: usize, frequency: Frequency) -> Result<Vec<ForecastRow>> {
        ensure_horizon(horizon)?;
        let count = self.training_length + horizon;
        let stamps = timeline(self.training_start, count, frequency)?;
        let history = self.training_length as f64;
        Ok(stamps
            .into_iter()
            .enumerate()
            .map(|(index, timestamp)| {
                let predicted = self.value_at(index);
                let steps_ahead = (index + 1).saturating_sub(self.training_length) as f64;
                let margin = INTERVAL_Z * self.residual_std * (1.0 + steps_ahead / history).sqrt();
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

/// Seasonal-trend engine. Disabled builds and runtime switches make it
/// report itself unavailable.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalBackend {
    enabled: bool,
}

impl SeasonalBackend {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: enabled && cfg!(feature = "seasonal"),
        }
    }
}

impl Default for SeasonalBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ForecastBackend for SeasonalBackend {
    fn kind(&self) -> ModelKind {
        ModelKind::Seasonal
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    fn train(&self, series: &AggregatedSeries) -> Result<TrainedModel> {
        if !self.enabled {
            return Err(ForecastError::BackendUnavailable(ModelKind::Seasonal));
        }
        let model = SeasonalModel::fit(series)?;
        debug!(
            periods = model.training_length,
            changepoints = model.changepoints.len(),
            seasonalities = model.seasonalities.len(),
            residual_std = model.residual_std,
            "fitted seasonal model"
        );
        Ok(TrainedModel::Seasonal(model))
    }

    fn predict(
        &self,
        model: &TrainedModel,
        horizon: usize,
        frequency: Frequency,
    ) -> Result<Vec<ForecastRow>> {
        if !self.enabled {
            return Err(ForecastError::BackendUnavailable(ModelKind::Seasonal));
        }
        match model {
            TrainedModel::Seasonal(model) => model.predict(horizon, frequency),
            other => Err(ForecastError::InvalidInput(format!(
                "seasonal backend cannot predict with a {} model",
                other.kind()
            ))),
        }
    }
}

fn scaled_time(index: usize, training_length: usize) -> f64 {
    index as f64 / (training_length.max(2) - 1) as f64
}

/// Evenly spaced over the first 80% of the history, excluding the start.
fn changepoint_positions(n: usize) -> Vec<f64> {
    let window = (n as f64 * CHANGEPOINT_RANGE).floor() as usize;
    let count = MAX_CHANGEPOINTS.min(window.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last = (window - 1) as f64;
    let mut positions: Vec<f64> = (1..=count)
        .map(|step| (last * step as f64 / count as f64).round() as usize)
        .map(|index| scaled_time(index, n))
        .collect();
    positions.dedup();
    positions
}

/// `(name, period in periods, Fourier order)` for each cycle the history can support.
fn seasonal_cycles(frequency: Frequency, n: usize) -> Vec<(&'static str, f64, usize)> {
    let mut cycles = Vec::new();
    match frequency {
        Frequency::Day => {
            if n >= 14 {
                cycles.push(("weekly", 7.0, 3));
            }
            if n >= 730 {
                cycles.push(("yearly", 365.25, 10));
            }
        }
        Frequency::Week => {
            if n >= 104 {
                cycles.push(("yearly", 365.25 / 7.0, 10));
            }
        }
        Frequency::MonthStart => {
            if n >= 24 {
                cycles.push(("yearly", 12.0, 5));
            }
        }
        Frequency::QuarterStart => {
            if n >= 8 {
                cycles.push(("yearly", 4.0, 1));
            }
        }
    }
    cycles
}

fn design_row(
    index: usize,
    n: usize,
    changepoints: &[f64],
    cycles: &[(&'static str, f64, usize)],
) -> Vec<f64> {
    let t = scaled_time(index, n);
    let mut row = vec![1.0, t];
    row.extend(changepoints.iter().map(|position| (t - position).max(0.0)));
    for (_, period, order) in cycles {
        row.extend(SeasonalTerm::features(*period, *order, index as f64));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::aggregate::aggregate;
    use crate::ledger::ExpenseRecord;

    const WEEKLY_SHAPE: [f64; 7] = [0.0, 5.0, 10.0, 0.0, -5.0, 30.0, 40.0];

    fn daily(values: impl IntoIterator<Item = f64>) -> AggregatedSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let records: Vec<ExpenseRecord> = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                ExpenseRecord::new(Frequency::Day.add_periods(start, i as i64).unwrap(), value)
            })
            .collect();
        aggregate(&records, Frequency::Day).unwrap()
    }

    #[test]
    fn recovers_weekly_pattern() {
        let series = daily((0..56).map(|i| 100.0 + WEEKLY_SHAPE[i % 7]));
        let model = SeasonalModel::fit(&series).unwrap();
        assert_eq!(model.seasonalities.len(), 1);

        let rows = model.predict(7, Frequency::Day).unwrap();
        assert_eq!(rows.len(), 63);
        for (offset, row) in rows[56..].iter().enumerate() {
            let expected = 100.0 + WEEKLY_SHAPE[(56 + offset) % 7];
            assert!(
                (row.predicted - expected).abs() < 0.5,
                "day {}: {} vs {}",
                offset,
                row.predicted,
                expected
            );
        }
    }

    #[test]
    fn follows_linear_growth() {
        let series = daily((0..60).map(|i| 10.0 + 1.5 * i as f64));
        let rows = SeasonalModel::fit(&series)
            .unwrap()
            .predict(10, Frequency::Day)
            .unwrap();
        let last = rows.last().unwrap();
        assert!((last.predicted - (10.0 + 1.5 * 69.0)).abs() < 1.0);
        for pair in rows[60..].windows(2) {
            assert!(pair[1].predicted > pair[0].predicted);
        }
    }

    #[test]
    fn future_bands_widen() {
        let series = daily((0..42).map(|i| 50.0 + ((i * 7919) % 13) as f64 - 6.0));
        let model = SeasonalModel::fit(&series).unwrap();
        assert!(model.residual_std > 0.0);
        let rows = model.predict(5, Frequency::Day).unwrap();
        for row in &rows {
            assert!(row.lower <= row.predicted && row.predicted <= row.upper);
        }
        let widths: Vec<f64> = rows[41..].iter().map(|row| row.upper - row.lower).collect();
        for pair in widths.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn seasonality_depends_on_history_length() {
        assert!(seasonal_cycles(Frequency::Day, 13).is_empty());
        assert_eq!(seasonal_cycles(Frequency::Day, 14).len(), 1);
        assert_eq!(seasonal_cycles(Frequency::Day, 730).len(), 2);
        assert!(seasonal_cycles(Frequency::Week, 103).is_empty());
        assert_eq!(seasonal_cycles(Frequency::MonthStart, 24)[0].2, 5);
        assert_eq!(seasonal_cycles(Frequency::QuarterStart, 8)[0].1, 4.0);
    }

    #[test]
    fn changepoints_stay_in_leading_window() {
        assert!(changepoint_positions(2).is_empty());
        let positions = changepoint_positions(200);
        assert_eq!(positions.len(), MAX_CHANGEPOINTS);
        assert!(positions.iter().all(|t| *t > 0.0 && *t <= CHANGEPOINT_RANGE));
    }

    #[test]
    fn two_periods_fit_a_line() {
        let model = SeasonalModel::fit(&daily([20.0, 30.0])).unwrap();
        assert!((model.value_at(2) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn disabled_backend_is_unavailable() {
        let backend = SeasonalBackend::new(false);
        assert!(!backend.is_available());
        assert!(matches!(
            backend.train(&daily([1.0, 2.0, 3.0])),
            Err(ForecastError::BackendUnavailable(ModelKind::Seasonal))
        ));
    }

    #[test]
    fn rejects_short_history_and_empty_horizon() {
        assert!(matches!(
            SeasonalModel::fit(&daily([5.0])),
            Err(ForecastError::InsufficientData { .. })
        ));
        let model = SeasonalModel::fit(&daily([5.0, 6.0, 7.0])).unwrap();
        assert!(matches!(
            model.predict(0, Frequency::Day),
            Err(ForecastError::InvalidHorizon(0))
        ));
    }
}
