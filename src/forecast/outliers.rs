//! Winsorizing of aggregated totals.

use tracing::debug;

use crate::errors::{ForecastError, Result};

use super::aggregate::AggregatedSeries;

pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

const MAX_PASSES: usize = 16;
const TOLERANCE: f64 = 1e-9;

/// Clamps every total into `mean ± z_threshold · stddev`.
///
/// The mean and standard deviation come from the values that survive
/// iterative clipping, so a single spike cannot widen its own bound. A zero
/// or undefined standard deviation is replaced by 1.0. Passes repeat until
/// nothing moves, which makes the output a fixed point.
///
/// When the surviving values are all equal, the unit deviation applies to
/// them even if the input was not constant. A sparse daily series that is
/// zero on most days therefore has its spending days clamped to
/// `z_threshold` (3.0 by default) rather than to a bound derived from the
/// full spread.
pub fn winsorize(series: &AggregatedSeries, z_threshold: f64) -> Result<AggregatedSeries> {
    if !z_threshold.is_finite() || z_threshold <= 0.0 {
        return Err(ForecastError::InvalidInput(format!(
            "z threshold must be positive, got {}",
            z_threshold
        )));
    }

    let mut values = series.values();
    let mut clipped = 0;
    for _ in 0..MAX_PASSES {
        let (lower, upper) = bounds(&values, z_threshold);
        let mut moved = 0;
        for value in values.iter_mut() {
            let clamped = value.clamp(lower, upper);
            if (clamped - *value).abs() > TOLERANCE * value.abs().max(1.0) {
                moved += 1;
            }
            *value = clamped;
        }
        clipped += moved;
        if moved == 0 {
            break;
        }
    }

    if clipped > 0 {
        debug!(clipped, z_threshold, "winsorized outliers");
    }
    Ok(series.with_values(values))
}

/// `(lower, upper)` clipping bounds for `values`.
pub fn bounds(values: &[f64], z_threshold: f64) -> (f64, f64) {
    let mut kept = values.to_vec();
    loop {
        let (lower, upper) = plain_bounds(&kept, z_threshold);
        let before = kept.len();
        kept.retain(|value| *value >= lower && *value <= upper);
        if kept.len() == before || kept.is_empty() {
            return (lower, upper);
        }
    }
}

fn plain_bounds(values: &[f64], z_threshold: f64) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NEG_INFINITY, f64::INFINITY);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let std = sample_std(values, mean)
        .filter(|std| *std > 0.0)
        .unwrap_or(1.0);
    (mean - z_threshold * std, mean + z_threshold * std)
}

fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt()).filter(|std| std.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::aggregate::SeriesPoint;
    use crate::ledger::Frequency;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> AggregatedSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &total)| SeriesPoint {
                timestamp: Frequency::Day.add_periods(start, i as i64).unwrap(),
                total,
            })
            .collect();
        AggregatedSeries::from_points(Frequency::Day, points).unwrap()
    }

    fn spiky() -> Vec<f64> {
        let mut values = vec![10.0; 40];
        values[7] = 12.0;
        values[21] = 8.0;
        values[30] = 5_000.0;
        values
    }

    #[test]
    fn spike_is_clipped_and_shape_preserved() {
        let input = series(&spiky());
        let output = winsorize(&input, DEFAULT_Z_THRESHOLD).unwrap();
        assert_eq!(output.len(), input.len());
        assert_eq!(output.start(), input.start());
        // The spike is removed from the statistics, leaving a flat 10 with a
        // unit deviation; 12 and 8 sit inside 10 ± 3.
        assert_eq!(output.values()[30], 13.0);
        assert_eq!(output.values()[7], 12.0);
        assert_eq!(output.values()[21], 8.0);
        assert_eq!(output.values()[0], 10.0);
    }

    #[test]
    fn winsorizing_is_idempotent() {
        let once = winsorize(&series(&spiky()), DEFAULT_Z_THRESHOLD).unwrap();
        let twice = winsorize(&once, DEFAULT_Z_THRESHOLD).unwrap();
        for (a, b) in once.values().iter().zip(twice.values()) {
            assert!((a - b).abs() < 1e-6, "{a} != {b}");
        }
    }

    #[test]
    fn constant_series_is_untouched() {
        let input = series(&[4.0; 12]);
        assert_eq!(bounds(&input.values(), 3.0), (1.0, 7.0));
        assert_eq!(winsorize(&input, 3.0).unwrap(), input);
    }

    #[test]
    fn linear_growth_has_no_outliers() {
        let values: Vec<f64> = (0..60).map(|i| 10.0 + 1.5 * i as f64).collect();
        let input = series(&values);
        assert_eq!(winsorize(&input, DEFAULT_Z_THRESHOLD).unwrap(), input);
    }

    #[test]
    fn sparse_spending_collapses_to_unit_bound() {
        let mut values = vec![0.0; 30];
        values[4] = 50.0;
        values[19] = 50.0;
        let input = series(&values);
        assert_eq!(bounds(&values, DEFAULT_Z_THRESHOLD), (-3.0, 3.0));

        let output = winsorize(&input, DEFAULT_Z_THRESHOLD).unwrap();
        assert_eq!(output.values()[4], 3.0);
        assert_eq!(output.values()[19], 3.0);
        assert_eq!(output.values()[0], 0.0);
        assert_eq!(winsorize(&output, DEFAULT_Z_THRESHOLD).unwrap(), output);
    }

    #[test]
    fn single_value_uses_unit_deviation() {
        assert_eq!(bounds(&[5.0], 2.0), (3.0, 7.0));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        assert!(winsorize(&series(&[1.0, 2.0]), 0.0).is_err());
        assert!(winsorize(&series(&[1.0, 2.0]), f64::NAN).is_err());
    }
}
