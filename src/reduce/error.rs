use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure computing a statistic over collected samples.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatError {
    #[error("percentile must be between 0 and 100, got {0}")]
    InvalidPercentile(f64),
}

/// Errors surfaced by an aggregation pass.
///
/// A pass either produces a full result bundle or one of these; partial
/// bundles are never returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReduceError {
    #[error("invalid date range: {instant} is outside {start}..={end}")]
    InvalidDateRange {
        instant: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("date range spans {days} days, at most {max_days} allowed")]
    RangeTooLarge { days: i64, max_days: u32 },
    #[error("statistic computation failed: {0}")]
    Statistic(#[from] StatError),
    #[error("unknown aggregate field '{0}'")]
    UnknownField(String),
    #[error("unknown statistic '{0}'")]
    UnknownStatistic(String),
}

impl ReduceError {
    /// Short machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ReduceError::InvalidDateRange { .. } => "invalid_date_range",
            ReduceError::RangeTooLarge { .. } => "range_too_large",
            ReduceError::Statistic(_) => "statistic",
            ReduceError::UnknownField(_) => "unknown_field",
            ReduceError::UnknownStatistic(_) => "unknown_statistic",
        }
    }
}
