//! Core types: time, canonical events, accounts, availability slots

pub mod account;
pub mod event;
pub mod slot;
pub mod time;
pub mod tracing;

pub use account::{AccountMetadata, CalendarAccount, Provider};
pub use event::CanonicalEvent;
pub use slot::{all_day_events_on, busy_hours, events_in_slot, is_slot_busy, TimeSlot};
pub use time::{EventTime, TimeWindow};
pub use self::tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
