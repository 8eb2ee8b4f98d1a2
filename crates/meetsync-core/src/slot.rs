//! Hourly availability slots.
//!
//! The availability view is a grid of one-hour slots plus a separate all-day
//! lane per date. Timed events occupy every slot they overlap; all-day events
//! never bleed into hourly slots.

use crate::event::CanonicalEvent;
use crate::time::TimeWindow;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A one-hour availability slot on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// The slot's calendar date (UTC).
    pub date: NaiveDate,
    /// Hour of day, `0..=23`.
    pub hour: u32,
}

impl TimeSlot {
    /// Creates a slot for the given date and hour.
    ///
    /// # Panics
    ///
    /// Panics if `hour` is not in `0..24`.
    pub fn new(date: NaiveDate, hour: u32) -> Self {
        assert!(hour < 24, "slot hour must be in 0..24");
        Self { date, hour }
    }

    /// Start of the slot as a UTC instant.
    pub fn start(&self) -> DateTime<Utc> {
        self.date
            .and_hms_opt(self.hour, 0, 0)
            .expect("valid slot time")
            .and_utc()
    }

    /// The half-open `[start, start+1h)` window covered by this slot.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::from_duration(self.start(), Duration::hours(1))
    }

    /// Whether a timed event occupies this slot.
    ///
    /// Uses strict interval overlap: an event ending exactly at the slot
    /// start (or starting exactly at the slot end) does not occupy it.
    /// All-day events never occupy hourly slots.
    pub fn contains_event(&self, event: &CanonicalEvent) -> bool {
        if event.is_all_day() {
            return false;
        }
        self.window().overlaps_event(&event.start, &event.end)
    }
}

/// Returns the events occupying the given hourly slot.
pub fn events_in_slot<'a>(
    events: &'a [CanonicalEvent],
    slot: TimeSlot,
) -> Vec<&'a CanonicalEvent> {
    events.iter().filter(|e| slot.contains_event(e)).collect()
}

/// Whether any event occupies the given hourly slot.
pub fn is_slot_busy(events: &[CanonicalEvent], date: NaiveDate, hour: u32) -> bool {
    let slot = TimeSlot::new(date, hour);
    events.iter().any(|e| slot.contains_event(e))
}

/// Returns the all-day-lane events for a date.
///
/// An all-day event lands in the lane of its start date.
pub fn all_day_events_on<'a>(
    events: &'a [CanonicalEvent],
    date: NaiveDate,
) -> Vec<&'a CanonicalEvent> {
    events
        .iter()
        .filter(|e| e.is_all_day() && e.start.date() == date)
        .collect()
}

/// Computes the busy mask for every hourly slot of a date.
pub fn busy_hours(events: &[CanonicalEvent], date: NaiveDate) -> [bool; 24] {
    let mut mask = [false; 24];
    for (hour, busy) in mask.iter_mut().enumerate() {
        let slot = TimeSlot::new(date, hour as u32);
        *busy = events.iter().any(|e| slot.contains_event(e));
    }
    mask
}
