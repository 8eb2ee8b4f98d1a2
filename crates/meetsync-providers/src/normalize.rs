//! Raw-to-canonical event normalization.
//!
//! This is the only place raw provider data becomes [`CanonicalEvent`]s,
//! and the only place the ordering invariant is repaired: every event that
//! leaves this module satisfies `start < end`.

use chrono::Duration;
use tracing::warn;

use meetsync_core::event::CanonicalEvent;
use meetsync_core::time::EventTime;

use crate::raw_event::{RawEvent, RawEventTime};

/// Converts a raw event into a canonical one.
///
/// Returns `None` for cancelled events and for events whose boundaries
/// cannot be repaired (an end strictly before the start).
pub fn normalize_event(account_id: &str, raw: &RawEvent) -> Option<CanonicalEvent> {
    if raw.is_cancelled() {
        return None;
    }

    let start = convert_time(&raw.start);
    let end = match repair_end(&start, raw.end.as_ref().map(convert_time)) {
        Some(end) => end,
        None => {
            warn!(
                event_id = %raw.id,
                "dropping event with end before start"
            );
            return None;
        }
    };

    let mut event = CanonicalEvent::new(raw.id.clone(), account_id, start, end);
    if let Some(ref summary) = raw.summary {
        let trimmed = summary.trim();
        if !trimmed.is_empty() {
            event = event.with_title(trimmed);
        }
    }
    Some(event)
}

/// Normalizes a batch of raw events for one account.
///
/// Cancelled and irreparable events are dropped; the result is sorted by
/// start time (ties broken by id for determinism).
pub fn normalize_events(account_id: &str, raws: &[RawEvent]) -> Vec<CanonicalEvent> {
    let mut events: Vec<CanonicalEvent> = raws
        .iter()
        .filter_map(|raw| normalize_event(account_id, raw))
        .collect();
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    events
}

fn convert_time(raw: &RawEventTime) -> EventTime {
    match raw {
        RawEventTime::DateTime(dt) => EventTime::from_utc(*dt),
        RawEventTime::Date(date) => EventTime::from_date(*date),
    }
}

/// Repairs the end boundary so that `start < end` holds.
///
/// A missing or zero-length end becomes start plus one hour for timed
/// events, or the next day for all-day events. An end strictly before the
/// start is irreparable.
fn repair_end(start: &EventTime, end: Option<EventTime>) -> Option<EventTime> {
    match end {
        Some(end) if start.is_before(&end) => Some(end),
        Some(end) if end.is_before(start) => None,
        // None or exactly equal to start
        _ => Some(default_end(start)),
    }
}

fn default_end(start: &EventTime) -> EventTime {
    match start {
        EventTime::DateTime(dt) => EventTime::from_utc(*dt + Duration::hours(1)),
        EventTime::AllDay(date) => {
            EventTime::from_date(date.succ_opt().expect("valid successor date"))
        }
    }
}
