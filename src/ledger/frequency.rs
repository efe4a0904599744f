use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{ForecastError, Result};

/// Resampling cadence of an aggregated series.
///
/// Every period is identified by its anchor: the day itself, the Monday of
/// its ISO week, or the first day of its month or quarter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Day,
    Week,
    MonthStart,
    QuarterStart,
}

impl Frequency {
    /// Parses user-facing codes such as `D`, `week`, `MS` or `quarter-start`.
    pub fn parse(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "daily" => Ok(Frequency::Day),
            "w" | "week" | "weekly" => Ok(Frequency::Week),
            "m" | "ms" | "month" | "month-start" | "monthly" => Ok(Frequency::MonthStart),
            "q" | "qs" | "quarter" | "quarter-start" | "quarterly" => Ok(Frequency::QuarterStart),
            _ => Err(ForecastError::InvalidFrequency(code.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Frequency::Day => "D",
            Frequency::Week => "W",
            Frequency::MonthStart => "MS",
            Frequency::QuarterStart => "QS",
        }
    }

    /// Start of the period containing `date`.
    pub fn anchor(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Day => date,
            Frequency::Week => {
                let delta = date.weekday().num_days_from_monday() as u64;
                date.checked_sub_days(Days::new(delta)).unwrap_or(date)
            }
            Frequency::MonthStart => first_of_month(date.year(), date.month()).unwrap_or(date),
            Frequency::QuarterStart => {
                let month = ((date.month() - 1) / 3) * 3 + 1;
                first_of_month(date.year(), month).unwrap_or(date)
            }
        }
    }

    /// Moves `from` by `steps` periods; negative steps move backwards.
    pub fn add_periods(self, from: NaiveDate, steps: i64) -> Result<NaiveDate> {
        let shifted = match self {
            Frequency::Day => shift_days(from, steps),
            Frequency::Week => steps.checked_mul(7).and_then(|days| shift_days(from, days)),
            Frequency::MonthStart => shift_months(from, steps),
            Frequency::QuarterStart => steps.checked_mul(3).and_then(|m| shift_months(from, m)),
        };
        shifted.ok_or_else(|| {
            ForecastError::InvalidInput(format!(
                "date {} shifted by {} {} periods is out of range",
                from, steps, self
            ))
        })
    }

    pub fn next(self, from: NaiveDate) -> Result<NaiveDate> {
        self.add_periods(from, 1)
    }

    /// Number of whole periods from the anchor of `start` to the anchor of `end`.
    pub fn periods_between(self, start: NaiveDate, end: NaiveDate) -> i64 {
        let start = self.anchor(start);
        let end = self.anchor(end);
        match self {
            Frequency::Day => (end - start).num_days(),
            Frequency::Week => (end - start).num_days() / 7,
            Frequency::MonthStart => month_index(end) - month_index(start),
            Frequency::QuarterStart => (month_index(end) - month_index(start)) / 3,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Day => "day",
            Frequency::Week => "week",
            Frequency::MonthStart => "month-start",
            Frequency::QuarterStart => "quarter-start",
        };
        f.write_str(label)
    }
}

fn first_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

fn shift_days(from: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        from.checked_add_days(Days::new(days as u64))
    } else {
        from.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn shift_months(from: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        from.checked_add_months(Months::new(magnitude))
    } else {
        from.checked_sub_months(Months::new(magnitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_short_and_long_codes() {
        assert_eq!(Frequency::parse("D").unwrap(), Frequency::Day);
        assert_eq!(Frequency::parse("weekly").unwrap(), Frequency::Week);
        assert_eq!(Frequency::parse("MS").unwrap(), Frequency::MonthStart);
        assert_eq!(Frequency::parse("m").unwrap(), Frequency::MonthStart);
        assert_eq!(Frequency::parse("quarter-start").unwrap(), Frequency::QuarterStart);
        assert!(matches!(
            Frequency::parse("H"),
            Err(ForecastError::InvalidFrequency(code)) if code == "H"
        ));
    }

    #[test]
    fn anchors_snap_to_period_start() {
        // 2024-05-16 is a Thursday.
        let day = date(2024, 5, 16);
        assert_eq!(Frequency::Day.anchor(day), day);
        assert_eq!(Frequency::Week.anchor(day), date(2024, 5, 13));
        assert_eq!(Frequency::MonthStart.anchor(day), date(2024, 5, 1));
        assert_eq!(Frequency::QuarterStart.anchor(day), date(2024, 4, 1));
        assert_eq!(Frequency::QuarterStart.anchor(date(2024, 12, 31)), date(2024, 10, 1));
    }

    #[test]
    fn add_periods_moves_both_directions() {
        let start = date(2024, 11, 1);
        assert_eq!(
            Frequency::MonthStart.add_periods(start, 3).unwrap(),
            date(2025, 2, 1)
        );
        assert_eq!(
            Frequency::QuarterStart.add_periods(start, -2).unwrap(),
            date(2024, 5, 1)
        );
        assert_eq!(
            Frequency::Week.add_periods(date(2024, 12, 30), 1).unwrap(),
            date(2025, 1, 6)
        );
        assert_eq!(
            Frequency::Day.add_periods(date(2024, 3, 1), -1).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn periods_between_counts_anchor_steps() {
        assert_eq!(
            Frequency::MonthStart.periods_between(date(2023, 11, 20), date(2024, 2, 3)),
            3
        );
        assert_eq!(
            Frequency::QuarterStart.periods_between(date(2023, 1, 5), date(2023, 12, 31)),
            3
        );
        assert_eq!(
            Frequency::Week.periods_between(date(2024, 5, 13), date(2024, 5, 26)),
            1
        );
    }

    #[test]
    fn out_of_range_shift_is_an_error() {
        assert!(Frequency::Day.add_periods(NaiveDate::MAX, 1).is_err());
    }
}
