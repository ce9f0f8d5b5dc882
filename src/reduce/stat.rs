//! Incremental sample accumulators
//!
//! Aggregation is generic over [`SampleStat`] so the statistic backend can
//! be swapped; [`StreamingStat`] is the default and keeps every valid
//! sample so that exact order statistics can be computed on demand.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::fmt;
use std::str::FromStr;

use super::error::{ReduceError, StatError};

/// An accumulator fed one sample at a time and queried for summaries.
///
/// Queries never mutate the accumulator and may be interleaved with more
/// pushes. With no valid samples, queries return NaN.
pub trait SampleStat: Default + Send {
    /// Record one sample. Non-finite values are ignored.
    fn push(&mut self, value: f64);

    /// Number of valid samples recorded.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn mean(&self) -> f64;

    fn median(&self) -> f64;

    /// `p`-th percentile, `p` in `0..=100`.
    fn percentile(&self, p: f64) -> Result<f64, StatError>;
}

/// Exact accumulator. Keeps every finite sample; the mean and the order
/// statistics come from `statrs`.
#[derive(Debug, Clone, Default)]
pub struct StreamingStat {
    samples: Vec<f64>,
}

impl StreamingStat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear interpolation between the two order statistics around rank
    /// `tau * (n - 1)`.
    fn quantile(&self, tau: f64) -> f64 {
        if self.samples.is_empty() {
            return f64::NAN;
        }

        let mut data = Data::new(self.samples.clone());
        let rank = tau * (self.samples.len() - 1) as f64;
        let below = rank.floor();

        // order_statistic is 1-based
        let lower = data.order_statistic(below as usize + 1);
        if rank == below {
            return lower;
        }
        let upper = data.order_statistic(rank.ceil() as usize + 1);
        lower + (rank - below) * (upper - lower)
    }
}

impl SampleStat for StreamingStat {
    fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.samples.push(value);
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn mean(&self) -> f64 {
        self.samples.iter().mean()
    }

    fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    fn percentile(&self, p: f64) -> Result<f64, StatError> {
        if !(0.0..=100.0).contains(&p) {
            return Err(StatError::InvalidPercentile(p));
        }
        Ok(self.quantile(p / 100.0))
    }
}

/// A summary that can be requested per timing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Median,
    /// Percentile chosen by the navigation options
    Percentile,
    #[serde(rename = "first_q")]
    FirstQuartile,
    #[serde(rename = "third_q")]
    ThirdQuartile,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Percentile => "percentile",
            Statistic::FirstQuartile => "first_q",
            Statistic::ThirdQuartile => "third_q",
        }
    }

    /// Compute this statistic over `stat`. `percentile` is only used by
    /// [`Statistic::Percentile`].
    pub fn compute<S: SampleStat>(&self, stat: &S, percentile: f64) -> Result<f64, StatError> {
        match self {
            Statistic::Mean => Ok(stat.mean()),
            Statistic::Median => Ok(stat.median()),
            Statistic::Percentile => stat.percentile(percentile),
            Statistic::FirstQuartile => stat.percentile(25.0),
            Statistic::ThirdQuartile => stat.percentile(75.0),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "percentile" => Ok(Statistic::Percentile),
            "first_q" => Ok(Statistic::FirstQuartile),
            "third_q" => Ok(Statistic::ThirdQuartile),
            other => Err(ReduceError::UnknownStatistic(other.to_string())),
        }
    }
}
