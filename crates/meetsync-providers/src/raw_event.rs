//! Raw event type shared by the provider adapters.
//!
//! [`RawEvent`] is the provider-agnostic shape of event data as it comes
//! off the wire, before normalization into the canonical model. Only the
//! fields the availability engine consumes are kept.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The time specification for a raw event boundary.
///
/// Providers signal all-day events by sending a bare date instead of a
/// datetime (`start.date` vs `start.dateTime` on Google, `VALUE=DATE` in
/// iCalendar), and this distinction must be preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawEventTime {
    /// A specific datetime in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day event date.
    Date(NaiveDate),
}

impl RawEventTime {
    /// Creates a `RawEventTime` from a UTC datetime.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a `RawEventTime` from a date (all-day event).
    pub fn from_date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    /// Returns true if this is an all-day boundary.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Converts to a UTC instant (all-day boundaries at midnight UTC).
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::Date(date) => date.and_hms_opt(0, 0, 0).expect("valid time").and_utc(),
        }
    }
}

/// A raw calendar event from a provider, pre-normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Unique identifier within the provider (Google event id, ICS UID).
    pub id: String,

    /// When the event starts.
    pub start: RawEventTime,

    /// When the event ends. Some feeds omit DTEND; normalization repairs
    /// the gap.
    pub end: Option<RawEventTime>,

    /// The event title/summary.
    pub summary: Option<String>,

    /// The event status (e.g. "confirmed", "cancelled").
    pub status: Option<String>,
}

impl RawEvent {
    /// Creates a new raw event with the required fields.
    pub fn new(id: impl Into<String>, start: RawEventTime) -> Self {
        Self {
            id: id.into(),
            start,
            end: None,
            summary: None,
            status: None,
        }
    }

    /// Builder method to set the end boundary.
    pub fn with_end(mut self, end: RawEventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Returns true if the event is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.eq_ignore_ascii_case("cancelled"))
    }

    /// Returns true if this is an all-day event.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_datetime() -> DateTime<Utc> {
        "2026-02-05T10:00:00Z".parse().unwrap()
    }

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 5).unwrap()
    }

    #[test]
    fn time_variants() {
        assert!(!RawEventTime::from_datetime(sample_datetime()).is_all_day());
        assert!(RawEventTime::from_date(sample_date()).is_all_day());
    }

    #[test]
    fn builder() {
        let event = RawEvent::new("evt-123", RawEventTime::from_datetime(sample_datetime()))
            .with_end(RawEventTime::from_datetime(sample_datetime()))
            .with_summary("Team Meeting")
            .with_status("confirmed");

        assert_eq!(event.id, "evt-123");
        assert_eq!(event.summary.as_deref(), Some("Team Meeting"));
        assert!(!event.is_cancelled());
        assert!(!event.is_all_day());
        assert!(event.end.is_some());
    }

    #[test]
    fn cancelled_status_is_case_insensitive() {
        let event = RawEvent::new("evt-1", RawEventTime::from_date(sample_date()))
            .with_status("CANCELLED");
        assert!(event.is_cancelled());
    }
}
