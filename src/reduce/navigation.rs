//! Navigation Timing statistics
//!
//! Every tracked field gets its own accumulator. Raw instants are pushed
//! when the hit carries them; derived durations are pushed for every hit
//! with a timing payload and simply come out as NaN (and are dropped by the
//! accumulator) when an operand is missing.

use std::collections::BTreeMap;

use super::error::ReduceError;
use super::stat::{SampleStat, Statistic, StreamingStat};
use super::HitAggregator;
use crate::models::{Hit, TimingField};

/// `result[statistic][field]`
pub type NavigationStats = BTreeMap<Statistic, BTreeMap<TimingField, f64>>;

pub struct NavigationTimingAggregator<S = StreamingStat> {
    /// One accumulator per field, indexed by [`TimingField::index`]
    stats: Vec<S>,
    calculate: Vec<Statistic>,
    percentile: f64,
}

impl<S: SampleStat> NavigationTimingAggregator<S> {
    /// `percentile` is the `p` used when [`Statistic::Percentile`] is
    /// requested.
    pub fn new(calculate: Vec<Statistic>, percentile: f64) -> Self {
        Self {
            stats: TimingField::all().map(|_| S::default()).collect(),
            calculate,
            percentile,
        }
    }

    fn stat_mut(&mut self, field: TimingField) -> Option<&mut S> {
        self.stats.get_mut(field.index())
    }
}

impl<S: SampleStat> HitAggregator for NavigationTimingAggregator<S> {
    type Output = NavigationStats;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError> {
        let Some(timing) = hit.navigation_timing.as_ref() else {
            return Ok(());
        };

        for field in TimingField::RAW {
            if let Some(value) = timing.get(field) {
                if let Some(stat) = self.stat_mut(field) {
                    stat.push(value);
                }
            }
        }

        for (field, end, start) in TimingField::DERIVED {
            let duration = timing.duration(end, start);
            if let Some(stat) = self.stat_mut(field) {
                stat.push(duration);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, ReduceError> {
        let mut result = NavigationStats::new();

        for statistic in &self.calculate {
            let per_field = result.entry(*statistic).or_default();
            for (field, stat) in TimingField::all().zip(&self.stats) {
                per_field.insert(field, statistic.compute(stat, self.percentile)?);
            }
        }

        Ok(result)
    }
}

/// Mean of `loadEventEnd - navigationStart`; 0 when no hit has both.
#[derive(Debug, Default)]
pub struct LoadTimeAggregator {
    total: f64,
    count: u64,
}

impl HitAggregator for LoadTimeAggregator {
    type Output = f64;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError> {
        let load_time = hit
            .navigation_timing
            .as_ref()
            .map(|timing| timing.load_time())
            .unwrap_or(f64::NAN);

        if load_time.is_finite() {
            self.total += load_time;
            self.count += 1;
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, ReduceError> {
        if self.count == 0 {
            return Ok(0.0);
        }
        Ok(self.total / self.count as f64)
    }
}
