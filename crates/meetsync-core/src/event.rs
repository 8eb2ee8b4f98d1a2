//! The canonical event model.
//!
//! Every provider adapter is normalized into [`CanonicalEvent`] before it
//! reaches the availability engine, so downstream code never branches on
//! provider-specific payload shapes.

use crate::time::EventTime;
use serde::{Deserialize, Serialize};

/// A provider-independent calendar event.
///
/// Invariants upheld by the normalization layer:
/// - `start` is strictly before `end`
/// - all-day events carry date-only boundaries, timed events carry UTC instants
/// - `account_id` names the connected account the event was fetched through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Provider-assigned event identifier (unique within the source calendar).
    pub id: String,
    /// The connected account this event belongs to.
    pub account_id: String,
    /// Event start.
    pub start: EventTime,
    /// Event end (exclusive).
    pub end: EventTime,
    /// Event title, when the provider exposes one.
    pub title: Option<String>,
}

impl CanonicalEvent {
    /// Creates a new canonical event.
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            start,
            end,
            title: None,
        }
    }

    /// Sets the event title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whether this is a day-granularity event.
    ///
    /// Derived from the start boundary rather than stored as a separate flag,
    /// so it can never disagree with the time representation.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Whether the event satisfies the start-before-end ordering invariant.
    pub fn is_well_ordered(&self) -> bool {
        self.start.is_before(&self.end)
    }
}
