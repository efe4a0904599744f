//! Resampling of raw expense records into a gap-free, fixed-frequency series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ForecastError, Result};
use crate::ledger::{ExpenseRecord, Frequency};

/// Total spending for one period, keyed by the period anchor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: NaiveDate,
    pub total: f64,
}

/// Per-period totals with strictly increasing, contiguous anchors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedSeries {
    frequency: Frequency,
    points: Vec<SeriesPoint>,
}

impl AggregatedSeries {
    /// Builds a series after checking that every timestamp is an anchor and
    /// exactly one period after its predecessor.
    pub fn from_points(frequency: Frequency, points: Vec<SeriesPoint>) -> Result<Self> {
        for point in &points {
            if frequency.anchor(point.timestamp) != point.timestamp {
                return Err(ForecastError::InvalidInput(format!(
                    "{} is not the start of a {} period",
                    point.timestamp, frequency
                )));
            }
        }
        for pair in points.windows(2) {
            let expected = frequency.next(pair[0].timestamp)?;
            if pair[1].timestamp != expected {
                return Err(ForecastError::InvalidInput(format!(
                    "series jumps from {} to {}, expected {}",
                    pair[0].timestamp, pair[1].timestamp, expected
                )));
            }
        }
        Ok(Self { frequency, points })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.total).collect()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.points.first().map(|point| point.timestamp)
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.points.last().map(|point| point.timestamp)
    }

    /// Same timestamps, new totals. `values` must match the series length.
    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.points.len());
        let points = self
            .points
            .iter()
            .zip(values)
            .map(|(point, total)| SeriesPoint {
                timestamp: point.timestamp,
                total,
            })
            .collect();
        Self {
            frequency: self.frequency,
            points,
        }
    }
}

/// Sums `records` per period and zero-fills every period between the first
/// and last one that saw spending.
pub fn aggregate(records: &[ExpenseRecord], frequency: Frequency) -> Result<AggregatedSeries> {
    if records.is_empty() {
        return Err(ForecastError::EmptyInput);
    }

    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        if !record.amount.is_finite() {
            return Err(ForecastError::InvalidInput(format!(
                "non-finite amount on {}",
                record.date
            )));
        }
        *buckets.entry(frequency.anchor(record.date)).or_insert(0.0) += record.amount;
    }

    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(ForecastError::EmptyInput),
    };

    let span = frequency.periods_between(first, last);
    let mut points = Vec::with_capacity(span as usize + 1);
    let mut timestamp = first;
    for step in 0..=span {
        if step > 0 {
            timestamp = frequency.next(timestamp)?;
        }
        points.push(SeriesPoint {
            timestamp,
            total: buckets.get(&timestamp).copied().unwrap_or(0.0),
        });
    }

    debug!(
        records = records.len(),
        periods = points.len(),
        %frequency,
        "aggregated expense records"
    );
    Ok(AggregatedSeries { frequency, points })
}
