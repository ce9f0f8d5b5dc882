use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timing::NavigationTiming;

/// One recorded page view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub path: Option<String>,
    pub hostname: Option<String>,
    pub referrer: Option<String>,
    /// Host part of `referrer`, filled in at ingest when it parses
    pub referrer_hostname: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "navigationTiming")]
    pub navigation_timing: Option<NavigationTiming>,
}

impl Hit {
    /// Create a hit stamped at `at` with nothing else set.
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            path: None,
            hostname: None,
            referrer: None,
            referrer_hostname: None,
            created_at: at,
            updated_at: at,
            navigation_timing: None,
        }
    }
}

/// Beacon payload posted by the client script.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHit {
    pub path: Option<String>,
    pub hostname: Option<String>,
    pub referrer: Option<String>,
    #[serde(rename = "navigationTiming")]
    pub navigation_timing: Option<NavigationTiming>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewHit {
    /// Turn the beacon payload into a stored hit, precomputing the referrer host.
    pub fn into_hit(self, now: DateTime<Utc>) -> Hit {
        let created_at = self.created_at.unwrap_or(now);
        let referrer_hostname = self
            .referrer
            .as_deref()
            .and_then(crate::reduce::counters::referrer_host);

        Hit {
            path: self.path,
            hostname: self.hostname,
            referrer: self.referrer,
            referrer_hostname,
            created_at,
            updated_at: created_at,
            navigation_timing: self.navigation_timing,
        }
    }
}
