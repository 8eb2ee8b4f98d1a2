//! iCloud CalDAV adapter: discovery handshake, calendar-query, ICS parsing.

pub mod adapter;
pub mod client;
pub mod ics;
pub mod xml;

pub use adapter::{CalDavAdapter, CalDavConfig};
pub use client::CalDavClient;
