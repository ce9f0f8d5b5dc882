//! Hits per day, overall and per page

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;

use super::dates::{DateRange, DayBucket};
use super::error::ReduceError;
use super::{HitAggregator, ALL_PAGES};
use crate::models::Hit;

/// Day series keyed by page path, plus `__all`.
pub type DailySeries = HashMap<String, Vec<DayBucket>>;

/// Buckets hits per calendar day by `updatedAt`.
///
/// A hit outside the range fails the pass with `InvalidDateRange`.
#[derive(Debug)]
pub struct DailyHitAggregator {
    range: Option<DateRange>,
    series: DailySeries,
}

impl DailyHitAggregator {
    pub fn new(range: DateRange) -> Self {
        let mut series = HashMap::new();
        series.insert(ALL_PAGES.to_string(), range.buckets());
        Self {
            range: Some(range),
            series,
        }
    }

    /// Use `start`/`end` when given, otherwise the earliest and latest
    /// `createdAt` in `hits`.
    ///
    /// With no hits and no explicit bounds there is nothing to bucket and
    /// the result is empty.
    pub fn for_hits(
        hits: &[Hit],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        tz: FixedOffset,
    ) -> Result<Self, ReduceError> {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            (start, end) => {
                let (earliest, latest) = match created_at_bounds(hits) {
                    Some(bounds) => bounds,
                    None => match start.or(end) {
                        Some(only) => (only, only),
                        None => {
                            return Ok(Self {
                                range: None,
                                series: HashMap::new(),
                            })
                        }
                    },
                };
                (start.unwrap_or(earliest), end.unwrap_or(latest))
            }
        };

        Ok(Self::new(DateRange::new(start, end, tz)?))
    }
}

/// Earliest and latest `createdAt`, `None` for an empty slice.
fn created_at_bounds(hits: &[Hit]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    hits.iter().fold(None, |bounds, hit| {
        let at = hit.created_at;
        Some(match bounds {
            None => (at, at),
            Some((earliest, latest)) => (earliest.min(at), latest.max(at)),
        })
    })
}

impl HitAggregator for DailyHitAggregator {
    type Output = DailySeries;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError> {
        let Some(range) = self.range.as_ref() else {
            return Ok(());
        };

        let index = range.index_of(hit.updated_at)?;

        if let Some(path) = hit.path.as_deref() {
            let buckets = self
                .series
                .entry(path.to_string())
                .or_insert_with(|| range.buckets());
            buckets[index].hits += 1;
        }

        if let Some(all) = self.series.get_mut(ALL_PAGES) {
            all[index].hits += 1;
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, ReduceError> {
        Ok(self.series)
    }
}
