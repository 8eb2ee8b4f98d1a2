//! ICS/iCalendar parsing.
//!
//! Parsing RFC 5545 is delegated to the `icalendar` crate; this module
//! only maps parsed VEVENTs onto [`RawEvent`]. An unparseable object is
//! skipped with a warning rather than failing the whole calendar.

use chrono::{TimeZone, Utc};
use icalendar::{Calendar, CalendarComponent, Component, DatePerhapsTime, Event, EventLike};
use tracing::warn;

use crate::raw_event::{RawEvent, RawEventTime};

/// Parses ICS content and extracts the events it contains.
///
/// Recurring events are expected to be expanded server-side by the
/// time-range query.
pub fn parse_ics_content(ics: &str) -> Vec<RawEvent> {
    let calendar = match ics.parse::<Calendar>() {
        Ok(cal) => cal,
        Err(e) => {
            warn!(error = %e, "failed to parse ICS content, skipping object");
            return Vec::new();
        }
    };

    calendar
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => parse_event(event),
            _ => None,
        })
        .collect()
}

/// Parses a single VEVENT component.
fn parse_event(event: &Event) -> Option<RawEvent> {
    let uid = event.get_uid()?;
    let start = convert_date_time(event.get_start()?);

    let mut raw = RawEvent::new(uid, start);

    // DTEND is optional; normalization repairs a missing end.
    if let Some(end) = event.get_end() {
        raw = raw.with_end(convert_date_time(end));
    }
    if let Some(summary) = event.get_summary() {
        raw = raw.with_summary(summary);
    }
    if let Some(status) = event.get_status() {
        raw = raw.with_status(format!("{status:?}"));
    }

    Some(raw)
}

/// Converts icalendar `DatePerhapsTime` to `RawEventTime`.
fn convert_date_time(dt: DatePerhapsTime) -> RawEventTime {
    match dt {
        DatePerhapsTime::Date(date) => RawEventTime::from_date(date),
        DatePerhapsTime::DateTime(cdt) => {
            use icalendar::CalendarDateTime;
            let utc_dt = match cdt {
                CalendarDateTime::Utc(dt) => dt,
                CalendarDateTime::Floating(naive) => Utc.from_utc_datetime(&naive),
                // Assume UTC when the TZID cannot be resolved.
                CalendarDateTime::WithTimezone { date_time, tzid: _ } => {
                    Utc.from_utc_datetime(&date_time)
                }
            };
            RawEventTime::from_datetime(utc_dt)
        }
    }
}
