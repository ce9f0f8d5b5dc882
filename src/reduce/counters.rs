//! Single-pass key counters: hostnames, referrers and hits per page

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use super::error::ReduceError;
use super::{HitAggregator, ALL_PAGES};
use crate::models::Hit;

/// Host part of a referrer URL, `None` when it does not parse or has no host.
pub fn referrer_host(referrer: &str) -> Option<String> {
    let parsed = Url::parse(referrer).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

/// Counts hits per hostname.
#[derive(Debug, Default)]
pub struct HostnameAggregator {
    counts: HashMap<String, u64>,
}

impl HitAggregator for HostnameAggregator {
    type Output = HashMap<String, u64>;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError> {
        if let Some(hostname) = hit.hostname.as_deref() {
            *self.counts.entry(hostname.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, ReduceError> {
        Ok(self.counts)
    }
}

/// Counts hits per page path, plus the `__all` total.
#[derive(Debug)]
pub struct PageHitAggregator {
    counts: HashMap<String, u64>,
}

impl Default for PageHitAggregator {
    fn default() -> Self {
        let mut counts = HashMap::new();
        counts.insert(ALL_PAGES.to_string(), 0);
        Self { counts }
    }
}

impl HitAggregator for PageHitAggregator {
    type Output = HashMap<String, u64>;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError> {
        *self.counts.entry(ALL_PAGES.to_string()).or_insert(0) += 1;

        if let Some(path) = hit.path.as_deref() {
            *self.counts.entry(path.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, ReduceError> {
        Ok(self.counts)
    }
}

/// One entry of the referrer ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerCount {
    pub hostname: String,
    pub count: u64,
}

/// Referrer counts and the same counts ranked by popularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferrerCounts {
    pub counts: HashMap<String, u64>,
    /// Count descending; equal counts keep first-seen order
    pub by_count: Vec<ReferrerCount>,
}

/// Counts hits per referring hostname.
///
/// Hits without a referrer, or whose referrer is not a URL with a host,
/// are skipped.
#[derive(Debug, Default)]
pub struct ReferrerAggregator {
    counts: HashMap<String, u64>,
    first_seen: Vec<String>,
}

impl HitAggregator for ReferrerAggregator {
    type Output = ReferrerCounts;

    fn update(&mut self, hit: &Hit) -> Result<(), ReduceError> {
        let hostname = match hit.referrer_hostname.as_deref() {
            Some(hostname) if !hostname.is_empty() => Some(hostname.to_string()),
            _ => hit.referrer.as_deref().and_then(referrer_host),
        };

        let Some(hostname) = hostname else {
            return Ok(());
        };

        match self.counts.get_mut(&hostname) {
            Some(count) => *count += 1,
            None => {
                self.first_seen.push(hostname.clone());
                self.counts.insert(hostname, 1);
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Output, ReduceError> {
        let mut by_count: Vec<ReferrerCount> = self
            .first_seen
            .into_iter()
            .map(|hostname| {
                let count = self.counts.get(&hostname).copied().unwrap_or(0);
                ReferrerCount { hostname, count }
            })
            .collect();

        // sort_by is stable, so ties stay in first-seen order
        by_count.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(ReferrerCounts {
            counts: self.counts,
            by_count,
        })
    }
}
