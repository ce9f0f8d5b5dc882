//! Single-pass aggregation over hit records
//!
//! [`map_reduce`] walks the hits once, feeding every requested aggregator,
//! then finalizes them into a [`ReduceResult`]. Only the aggregators for
//! the requested [`ReduceField`]s are built, and each call builds its own,
//! so concurrent passes share nothing.
//!
//! The result is always delivered asynchronously: the returned future
//! yields to the scheduler once before completing, even though the scan
//! itself never suspends.

pub mod counters;
pub mod daily;
pub mod dates;
pub mod error;
pub mod navigation;
pub mod stat;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use crate::models::Hit;

pub use counters::{
    referrer_host, HostnameAggregator, PageHitAggregator, ReferrerAggregator, ReferrerCount,
    ReferrerCounts,
};
pub use daily::{DailyHitAggregator, DailySeries};
pub use dates::{DateRange, DayBucket, MS_PER_DAY};
pub use error::{ReduceError, StatError};
pub use navigation::{LoadTimeAggregator, NavigationStats, NavigationTimingAggregator};
pub use stat::{SampleStat, Statistic, StreamingStat};

/// Key aggregating across every page.
pub const ALL_PAGES: &str = "__all";

/// One independent aggregate fed a hit at a time.
pub trait HitAggregator {
    type Output;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError>;

    fn finish(self) -> Result<Self::Output, ReduceError>;
}

/// Aggregates a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceField {
    Hostnames,
    HitsPerPage,
    Referrers,
    Navigation,
    HitsPerDay,
    AverageLoadTime,
}

impl ReduceField {
    pub const ALL: [ReduceField; 6] = [
        ReduceField::Hostnames,
        ReduceField::HitsPerPage,
        ReduceField::Referrers,
        ReduceField::Navigation,
        ReduceField::HitsPerDay,
        ReduceField::AverageLoadTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReduceField::Hostnames => "hostnames",
            ReduceField::HitsPerPage => "hits_per_page",
            ReduceField::Referrers => "referrers",
            ReduceField::Navigation => "navigation",
            ReduceField::HitsPerDay => "hits_per_day",
            ReduceField::AverageLoadTime => "average_load_time",
        }
    }
}

impl fmt::Display for ReduceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReduceField {
    type Err = ReduceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ReduceField::ALL
            .into_iter()
            .find(|field| field.as_str() == name)
            .ok_or_else(|| ReduceError::UnknownField(name.to_string()))
    }
}

pub type FieldSet = BTreeSet<ReduceField>;

/// Parse a comma separated list of field names. Empty entries are ignored.
pub fn parse_fields(list: &str) -> Result<FieldSet, ReduceError> {
    list.split(',')
        .filter(|name| !name.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Parse a comma separated list of statistic names. Empty entries are ignored.
pub fn parse_statistics(list: &str) -> Result<Vec<Statistic>, ReduceError> {
    list.split(',')
        .filter(|name| !name.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOptions {
    /// Statistics computed for every timing field
    pub calculate: Vec<Statistic>,
    /// `p` used for [`Statistic::Percentile`]
    pub percentile: f64,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            calculate: vec![Statistic::Median],
            percentile: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceOptions {
    /// First day for `hits_per_day`; earliest `createdAt` when unset
    pub start: Option<DateTime<Utc>>,
    /// Last day for `hits_per_day`; latest `createdAt` when unset
    pub end: Option<DateTime<Utc>>,
    /// Timezone whose calendar days are used for bucketing
    pub timezone: FixedOffset,
    pub navigation: NavigationOptions,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            timezone: Utc.fix(),
            navigation: NavigationOptions::default(),
        }
    }
}

/// Outcome of one pass. Unrequested aggregates are `None` and left out
/// when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReduceResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<HashMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<HashMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrers: Option<ReferrerCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_day: Option<DailySeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_load_time: Option<f64>,
    /// Wall-clock milliseconds spent in the pass
    pub processing_time: u64,
}

/// Aggregate `hits` into the requested `fields` using [`StreamingStat`]
/// for timing statistics.
pub async fn map_reduce(
    hits: &[Hit],
    fields: &FieldSet,
    options: &ReduceOptions,
) -> Result<ReduceResult, ReduceError> {
    map_reduce_with_stat::<StreamingStat>(hits, fields, options).await
}

/// Same as [`map_reduce`] with a caller-chosen statistic backend.
pub async fn map_reduce_with_stat<S: SampleStat>(
    hits: &[Hit],
    fields: &FieldSet,
    options: &ReduceOptions,
) -> Result<ReduceResult, ReduceError> {
    let started = Instant::now();
    let outcome = reduce_pass::<S>(hits, fields, options, started);

    // Never complete on the first poll
    tokio::task::yield_now().await;

    outcome
}

/// Callback flavour of [`map_reduce`]. `done` sees the outcome before it
/// is returned, so callers may consume either.
pub async fn map_reduce_with_callback<F>(
    hits: &[Hit],
    fields: &FieldSet,
    options: &ReduceOptions,
    done: F,
) -> Result<ReduceResult, ReduceError>
where
    F: FnOnce(Result<&ReduceResult, &ReduceError>),
{
    let outcome = map_reduce(hits, fields, options).await;
    done(outcome.as_ref());
    outcome
}

fn reduce_pass<S: SampleStat>(
    hits: &[Hit],
    fields: &FieldSet,
    options: &ReduceOptions,
    started: Instant,
) -> Result<ReduceResult, ReduceError> {
    let wants = |field| fields.contains(&field);

    let mut hostnames = wants(ReduceField::Hostnames).then(HostnameAggregator::default);
    let mut hits_per_page = wants(ReduceField::HitsPerPage).then(PageHitAggregator::default);
    let mut referrers = wants(ReduceField::Referrers).then(ReferrerAggregator::default);
    let mut navigation = wants(ReduceField::Navigation).then(|| {
        NavigationTimingAggregator::<S>::new(
            options.navigation.calculate.clone(),
            options.navigation.percentile,
        )
    });
    let mut hits_per_day = if wants(ReduceField::HitsPerDay) {
        Some(DailyHitAggregator::for_hits(
            hits,
            options.start,
            options.end,
            options.timezone,
        )?)
    } else {
        None
    };
    let mut load_time = wants(ReduceField::AverageLoadTime).then(LoadTimeAggregator::default);

    for hit in hits {
        update(&mut hostnames, hit)?;
        update(&mut hits_per_page, hit)?;
        update(&mut referrers, hit)?;
        update(&mut navigation, hit)?;
        update(&mut hits_per_day, hit)?;
        update(&mut load_time, hit)?;
    }

    let mut result = ReduceResult {
        hostnames: finish(hostnames)?,
        hits_per_page: finish(hits_per_page)?,
        referrers: finish(referrers)?,
        navigation: finish(navigation)?,
        hits_per_day: finish(hits_per_day)?,
        average_load_time: finish(load_time)?,
        processing_time: 0,
    };
    result.processing_time = started.elapsed().as_millis() as u64;

    debug!(
        "Reduced {} hits into {} aggregates in {}ms",
        hits.len(),
        fields.len(),
        result.processing_time
    );

    Ok(result)
}

fn update<A: HitAggregator>(aggregator: &mut Option<A>, hit: &Hit) -> Result<(), ReduceError> {
    if let Some(aggregator) = aggregator {
        aggregator.update(hit)?;
    }
    Ok(())
}

fn finish<A: HitAggregator>(aggregator: Option<A>) -> Result<Option<A::Output>, ReduceError> {
    aggregator.map(HitAggregator::finish).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields("hostnames, hits_per_day,,referrers").unwrap();
        assert_eq!(fields.len(), 3);
        assert!(fields.contains(&ReduceField::HitsPerDay));

        assert!(parse_fields("").unwrap().is_empty());
        assert_eq!(
            parse_fields("hostnames,bogus").unwrap_err(),
            ReduceError::UnknownField("bogus".to_string())
        );
    }

    #[test]
    fn test_parse_statistics_keeps_order() {
        let stats = parse_statistics("median,mean").unwrap();
        assert_eq!(stats, vec![Statistic::Median, Statistic::Mean]);
        assert!(parse_statistics("median,mode").is_err());
    }

    #[tokio::test]
    async fn test_empty_fields_only_report_processing_time() {
        let hits = vec![Hit::at(day(1)), Hit::at(day(2))];
        let result = map_reduce(&hits, &FieldSet::new(), &ReduceOptions::default())
            .await
            .unwrap();

        let json = serde_json::to_value(&result).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object.contains_key("processing_time"));
    }

    #[tokio::test]
    async fn test_only_requested_aggregates_are_present() {
        let hits = vec![Hit {
            hostname: Some("example.com".to_string()),
            ..Hit::at(day(1))
        }];
        let fields: FieldSet = [ReduceField::Hostnames].into_iter().collect();

        let result = map_reduce(&hits, &fields, &ReduceOptions::default())
            .await
            .unwrap();

        assert_eq!(result.hostnames.as_ref().unwrap()["example.com"], 1);
        assert!(result.hits_per_page.is_none());
        assert!(result.referrers.is_none());
        assert!(result.navigation.is_none());
        assert!(result.hits_per_day.is_none());
        assert!(result.average_load_time.is_none());
    }

    #[tokio::test]
    async fn test_result_is_never_ready_on_first_poll() {
        let hits = vec![Hit::at(day(1))];
        let fields: FieldSet = ReduceField::ALL.into_iter().collect();
        let options = ReduceOptions::default();

        let mut pass = Box::pin(map_reduce(&hits, &fields, &options));

        let ready_immediately = tokio::select! {
            biased;
            _ = &mut pass => true,
            _ = std::future::ready(()) => false,
        };
        assert!(!ready_immediately);

        let result = pass.await.unwrap();
        assert_eq!(result.hits_per_page.unwrap()[ALL_PAGES], 1);
    }

    #[tokio::test]
    async fn test_callback_and_future_see_same_result() {
        let hits = vec![
            Hit {
                path: Some("/a".to_string()),
                ..Hit::at(day(1))
            },
            Hit::at(day(1)),
        ];
        let fields: FieldSet = [ReduceField::HitsPerPage].into_iter().collect();

        let options = ReduceOptions::default();

        let mut seen = None;
        let returned = map_reduce_with_callback(&hits, &fields, &options, |outcome| {
            seen = outcome.ok().cloned();
        })
        .await
        .unwrap();

        assert_eq!(seen.unwrap().hits_per_page, returned.hits_per_page);
    }

    #[tokio::test]
    async fn test_callback_receives_failure() {
        let hits = vec![Hit::at(day(1))];
        let fields: FieldSet = [ReduceField::HitsPerDay].into_iter().collect();
        let options = ReduceOptions {
            start: Some(day(5)),
            end: Some(day(6)),
            ..Default::default()
        };

        let mut kind = None;
        let outcome = map_reduce_with_callback(&hits, &fields, &options, |outcome| {
            kind = outcome.err().map(ReduceError::kind);
        })
        .await;

        assert!(outcome.is_err());
        assert_eq!(kind, Some("invalid_date_range"));
    }
}
