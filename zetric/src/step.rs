//! Step granularities and timestamp bucketing.
//!
//! A [`Step`] maps an arbitrary Unix timestamp to a canonical bucket
//! timestamp. Buckets are the *nearest* multiple of the step width, using
//! round-half-up arithmetic — a timestamp past the midpoint of an interval
//! rounds forward into the next bucket. This is deliberate and load-bearing:
//! flooring instead would shift every bucket boundary by half a period.
//!
//! Month is special: its width is the number of days in the calendar month
//! containing the input time, so month buckets are non-uniform across
//! months and years. They are an approximation, not a true calendar index.
//!
//! # Example
//!
//! ```rust
//! use zetric::Step;
//!
//! // 30s is exactly halfway: rounds up into the next minute bucket.
//! assert_eq!(Step::Minute.bucket(30).unwrap(), 60);
//! assert_eq!(Step::Minute.bucket(29).unwrap(), 0);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StepError;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;
const WEEK: i64 = 604_800;

/// Bucket granularity for a time series.
///
/// The step is an explicit constructor parameter of
/// [`TimeSeries`](crate::TimeSeries); there is no global step registry.
/// Unknown granularity names fail fast at parse time with
/// [`StepError::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// 60-second buckets.
    Minute,
    /// 3600-second buckets.
    Hour,
    /// 86400-second buckets.
    Day,
    /// 604800-second buckets.
    Week,
    /// Calendar-month-sized buckets (variable width).
    Month,
}

impl Step {
    /// Returns the bucket width in seconds at the given time.
    ///
    /// For minute/hour/day/week the width is constant. For month it is the
    /// length of the calendar month containing `t`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::TimeOutOfRange`] if `t` cannot be resolved to a
    /// calendar date (month step only).
    pub fn width_at(self, t: i64) -> Result<i64, StepError> {
        match self {
            Step::Minute => Ok(MINUTE),
            Step::Hour => Ok(HOUR),
            Step::Day => Ok(DAY),
            Step::Week => Ok(WEEK),
            Step::Month => month_width(t),
        }
    }

    /// Rounds `t` to the nearest multiple of the step width (half rounds up).
    ///
    /// # Errors
    ///
    /// Returns [`StepError::TimeOutOfRange`] if `t` cannot be resolved to a
    /// calendar date (month step only).
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)] // epoch seconds are far below f64's exact-integer range
    pub fn bucket(self, t: i64) -> Result<i64, StepError> {
        let width = self.width_at(t)?;
        Ok((t as f64 / width as f64).round() as i64 * width)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Minute => "minute",
            Step::Hour => "hour",
            Step::Day => "day",
            Step::Week => "week",
            Step::Month => "month",
        };
        f.write_str(name)
    }
}

impl FromStr for Step {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(Step::Minute),
            "hour" => Ok(Step::Hour),
            "day" => Ok(Step::Day),
            "week" => Ok(Step::Week),
            "month" => Ok(Step::Month),
            other => Err(StepError::Unrecognized {
                name: other.to_string(),
            }),
        }
    }
}

/// Length in seconds of the calendar month containing `t`.
fn month_width(t: i64) -> Result<i64, StepError> {
    let out_of_range = || StepError::TimeOutOfRange { timestamp: t };

    let date = DateTime::<Utc>::from_timestamp(t, 0)
        .ok_or_else(out_of_range)?
        .date_naive();
    let first = date.with_day(1).ok_or_else(out_of_range)?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(out_of_range)?;

    Ok((next - first).num_days() * DAY)
}
