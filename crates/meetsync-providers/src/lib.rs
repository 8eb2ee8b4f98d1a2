//! Provider adapters for the aggregation engine.
//!
//! Each adapter fetches raw events from one provider family and hands them
//! to [`normalize`] for conversion into the canonical event model.

pub mod caldav;
pub mod error;
pub mod google;
pub mod normalize;
pub mod raw_event;

pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use normalize::{normalize_event, normalize_events};
pub use raw_event::{RawEvent, RawEventTime};
