//! Day bucket allocation over an inclusive date range

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::error::ReduceError;

pub const MS_PER_DAY: i64 = 86_400_000;

/// Hit count for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBucket {
    /// `YYYY-MM-DD` in the reporting timezone
    pub date: String,
    pub hits: u64,
}

/// Inclusive range of calendar days in a reporting timezone.
///
/// `start` is the first instant of the first day and `end` the last
/// millisecond of the last day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    first_day: NaiveDate,
    num_days: usize,
}

/// First instant of `day` in `tz`.
fn start_of_day(day: NaiveDate, tz: FixedOffset) -> DateTime<Utc> {
    let local_midnight = day.and_time(NaiveTime::MIN);
    (local_midnight - TimeDelta::seconds(tz.local_minus_utc() as i64)).and_utc()
}

impl DateRange {
    /// Build the range of days touched by `start..=end`.
    ///
    /// `start` must not be after `end`; the caller is responsible for
    /// ordering them.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<Self, ReduceError> {
        if start > end {
            return Err(ReduceError::InvalidDateRange {
                instant: start,
                start,
                end,
            });
        }

        let first_day = start.with_timezone(&tz).date_naive();
        let last_day = end.with_timezone(&tz).date_naive();

        let range_start = start_of_day(first_day, tz);
        let range_end = start_of_day(last_day, tz) + TimeDelta::milliseconds(MS_PER_DAY - 1);

        let num_days = (range_end - range_start).num_milliseconds() / MS_PER_DAY;

        Ok(Self {
            start: range_start,
            end: range_end,
            first_day,
            num_days: num_days as usize,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Number of buckets, both endpoints included.
    pub fn len(&self) -> usize {
        self.num_days + 1
    }

    /// A range always holds at least one day.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Bucket index for `instant`, or `InvalidDateRange` if it falls
    /// outside the range.
    pub fn index_of(&self, instant: DateTime<Utc>) -> Result<usize, ReduceError> {
        if !self.contains(instant) {
            return Err(ReduceError::InvalidDateRange {
                instant,
                start: self.start,
                end: self.end,
            });
        }

        let offset = (instant - self.start).num_milliseconds() / MS_PER_DAY;
        Ok(offset as usize)
    }

    /// One zeroed bucket per day, oldest first.
    pub fn buckets(&self) -> Vec<DayBucket> {
        self.first_day
            .iter_days()
            .take(self.len())
            .map(|day| DayBucket {
                date: day.format("%Y-%m-%d").to_string(),
                hits: 0,
            })
            .collect()
    }
}
