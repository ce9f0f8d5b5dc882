//! W3C Navigation Timing payload and the fields tracked from it
//!
//! See <https://www.w3.org/TR/navigation-timing/#processing-model> for the
//! meaning of each instant.

use serde::{Deserialize, Serialize};

/// Navigation timing instants in milliseconds. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub navigation_start: Option<f64>,
    pub unload_event_start: Option<f64>,
    pub unload_event_end: Option<f64>,
    pub redirect_start: Option<f64>,
    pub redirect_end: Option<f64>,
    pub fetch_start: Option<f64>,
    pub domain_lookup_start: Option<f64>,
    pub domain_lookup_end: Option<f64>,
    pub connect_start: Option<f64>,
    pub secure_connection_start: Option<f64>,
    pub connect_end: Option<f64>,
    pub request_start: Option<f64>,
    pub response_start: Option<f64>,
    pub response_end: Option<f64>,
    pub dom_loading: Option<f64>,
    pub dom_interactive: Option<f64>,
    pub dom_content_loaded_event_start: Option<f64>,
    pub dom_content_loaded_event_end: Option<f64>,
    pub dom_complete: Option<f64>,
    pub load_event_start: Option<f64>,
    pub load_event_end: Option<f64>,
}

/// Every field statistics are kept for: the raw instants followed by the
/// durations derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimingField {
    NavigationStart,
    UnloadEventStart,
    UnloadEventEnd,
    RedirectStart,
    RedirectEnd,
    FetchStart,
    DomainLookupStart,
    DomainLookupEnd,
    ConnectStart,
    SecureConnectionStart,
    ConnectEnd,
    RequestStart,
    ResponseStart,
    ResponseEnd,
    DomLoading,
    DomInteractive,
    DomContentLoadedEventStart,
    DomContentLoadedEventEnd,
    DomComplete,
    LoadEventStart,
    LoadEventEnd,

    RedirectDuration,
    DomainLookupDuration,
    ConnectDuration,
    RequestResponseDuration,
    UnloadEventDuration,
    DomContentLoadedEventDuration,
    LoadEventDuration,
    ProcessingDuration,
}

impl TimingField {
    /// Instants read straight off the payload.
    pub const RAW: [TimingField; 21] = [
        TimingField::NavigationStart,
        TimingField::UnloadEventStart,
        TimingField::UnloadEventEnd,
        TimingField::RedirectStart,
        TimingField::RedirectEnd,
        TimingField::FetchStart,
        TimingField::DomainLookupStart,
        TimingField::DomainLookupEnd,
        TimingField::ConnectStart,
        TimingField::SecureConnectionStart,
        TimingField::ConnectEnd,
        TimingField::RequestStart,
        TimingField::ResponseStart,
        TimingField::ResponseEnd,
        TimingField::DomLoading,
        TimingField::DomInteractive,
        TimingField::DomContentLoadedEventStart,
        TimingField::DomContentLoadedEventEnd,
        TimingField::DomComplete,
        TimingField::LoadEventStart,
        TimingField::LoadEventEnd,
    ];

    /// Durations as `(field, end, start)`, computed as `end - start`.
    ///
    /// `ProcessingDuration` spans `domLoading` to `loadEventEnd`, not a
    /// single phase.
    pub const DERIVED: [(TimingField, TimingField, TimingField); 8] = [
        (
            TimingField::RedirectDuration,
            TimingField::RedirectEnd,
            TimingField::RedirectStart,
        ),
        (
            TimingField::DomainLookupDuration,
            TimingField::DomainLookupEnd,
            TimingField::DomainLookupStart,
        ),
        (
            TimingField::ConnectDuration,
            TimingField::ConnectEnd,
            TimingField::ConnectStart,
        ),
        (
            TimingField::RequestResponseDuration,
            TimingField::ResponseEnd,
            TimingField::RequestStart,
        ),
        (
            TimingField::UnloadEventDuration,
            TimingField::UnloadEventEnd,
            TimingField::UnloadEventStart,
        ),
        (
            TimingField::DomContentLoadedEventDuration,
            TimingField::DomContentLoadedEventEnd,
            TimingField::DomContentLoadedEventStart,
        ),
        (
            TimingField::LoadEventDuration,
            TimingField::LoadEventEnd,
            TimingField::LoadEventStart,
        ),
        (
            TimingField::ProcessingDuration,
            TimingField::LoadEventEnd,
            TimingField::DomLoading,
        ),
    ];

    pub fn is_derived(self) -> bool {
        self >= TimingField::RedirectDuration
    }

    /// Position of the field in [`TimingField::all`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Iterate over raw fields then derived ones.
    pub fn all() -> impl Iterator<Item = TimingField> {
        Self::RAW
            .into_iter()
            .chain(Self::DERIVED.into_iter().map(|(field, _, _)| field))
    }
}

impl NavigationTiming {
    /// Value of a raw field. Derived fields are never stored, so they are
    /// always `None` here; use [`NavigationTiming::duration`] for those.
    pub fn get(&self, field: TimingField) -> Option<f64> {
        match field {
            TimingField::NavigationStart => self.navigation_start,
            TimingField::UnloadEventStart => self.unload_event_start,
            TimingField::UnloadEventEnd => self.unload_event_end,
            TimingField::RedirectStart => self.redirect_start,
            TimingField::RedirectEnd => self.redirect_end,
            TimingField::FetchStart => self.fetch_start,
            TimingField::DomainLookupStart => self.domain_lookup_start,
            TimingField::DomainLookupEnd => self.domain_lookup_end,
            TimingField::ConnectStart => self.connect_start,
            TimingField::SecureConnectionStart => self.secure_connection_start,
            TimingField::ConnectEnd => self.connect_end,
            TimingField::RequestStart => self.request_start,
            TimingField::ResponseStart => self.response_start,
            TimingField::ResponseEnd => self.response_end,
            TimingField::DomLoading => self.dom_loading,
            TimingField::DomInteractive => self.dom_interactive,
            TimingField::DomContentLoadedEventStart => self.dom_content_loaded_event_start,
            TimingField::DomContentLoadedEventEnd => self.dom_content_loaded_event_end,
            TimingField::DomComplete => self.dom_complete,
            TimingField::LoadEventStart => self.load_event_start,
            TimingField::LoadEventEnd => self.load_event_end,
            _ => None,
        }
    }

    /// `end - start`, or NaN when either operand is missing.
    pub fn duration(&self, end: TimingField, start: TimingField) -> f64 {
        match (self.get(end), self.get(start)) {
            (Some(end), Some(start)) => end - start,
            _ => f64::NAN,
        }
    }

    /// Time from navigation start until the load event finished.
    pub fn load_time(&self) -> f64 {
        self.duration(TimingField::LoadEventEnd, TimingField::NavigationStart)
    }
}
