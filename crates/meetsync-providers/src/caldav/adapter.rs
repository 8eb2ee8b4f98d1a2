//! iCloud CalDAV adapter.
//!
//! Performs the discovery handshake (principal, calendar home set,
//! calendar collections) and fetches events per calendar with a
//! calendar-query REPORT. Servers do not reliably clip recurrences to the
//! requested range, so events are filtered against the window again on
//! this side.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use meetsync_core::time::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;

use super::client::CalDavClient;
use super::ics::parse_ics_content;
use super::xml::{
    calendar_query_body, home_set_propfind_body, parse_nested_href, parse_propfind_response,
    parse_report_response, principal_propfind_body, propfind_calendars_body,
};

/// Default iCloud CalDAV endpoint.
const ICLOUD_CALDAV_URL: &str = "https://caldav.icloud.com/";

/// Configuration for the CalDAV adapter.
#[derive(Debug, Clone)]
pub struct CalDavConfig {
    /// The server's discovery entry point.
    pub base_url: Url,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl CalDavConfig {
    /// Configuration pointing at iCloud.
    pub fn icloud() -> Self {
        Self {
            base_url: Url::parse(ICLOUD_CALDAV_URL).expect("valid iCloud URL"),
            timeout: Duration::from_secs(30),
            user_agent: concat!("meetsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Points the adapter at a different CalDAV server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self::icloud()
    }
}

/// CalDAV adapter for iCloud calendars.
pub struct CalDavAdapter {
    client: CalDavClient,
    config: CalDavConfig,
}

impl CalDavAdapter {
    /// Creates a new adapter with the given configuration.
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        let client = CalDavClient::new(config.timeout, &config.user_agent)?;
        Ok(Self { client, config })
    }

    /// Verifies an Apple ID and app-specific password by running the
    /// discovery handshake. Returns the number of calendars found.
    ///
    /// Bad credentials surface as an unauthorized error from the first
    /// PROPFIND.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> ProviderResult<usize> {
        let calendars = self.discover_calendars(username, password).await?;
        info!(count = calendars.len(), "icloud credentials verified");
        Ok(calendars.len())
    }

    /// Fetches raw events from every calendar within the window.
    pub async fn fetch_events(
        &self,
        username: &str,
        password: &str,
        window: &TimeWindow,
    ) -> ProviderResult<Vec<RawEvent>> {
        let calendars = self.discover_calendars(username, password).await?;
        let query_body = calendar_query_body(window.start, window.end);

        let mut events = Vec::new();
        for calendar_url in &calendars {
            match self
                .client
                .report(calendar_url.as_str(), &query_body, username, password)
                .await
            {
                Ok(response) => {
                    for (_href, ics) in parse_report_response(&response) {
                        events.extend(parse_ics_content(&ics));
                    }
                }
                // A single broken calendar should not lose the rest,
                // but an auth failure applies to the whole account.
                Err(e) if e.kind() == crate::error::ProviderErrorKind::Unauthorized => {
                    return Err(e);
                }
                Err(e) => {
                    warn!(calendar = %calendar_url, error = %e, "skipping calendar");
                }
            }
        }

        let before = events.len();
        events.retain(|event| raw_event_in_window(event, window));
        debug!(
            fetched = before,
            in_window = events.len(),
            "filtered icloud events to window"
        );

        Ok(events)
    }

    /// Runs the discovery handshake and resolves calendar URLs.
    async fn discover_calendars(
        &self,
        username: &str,
        password: &str,
    ) -> ProviderResult<Vec<Url>> {
        let base = self.config.base_url.as_str();

        // 1. well-known URL -> principal
        let response = self
            .client
            .propfind(base, &principal_propfind_body(), 0, username, password)
            .await?;
        let principal_href =
            parse_nested_href(&response, "current-user-principal").ok_or_else(|| {
                ProviderError::malformed("discovery response has no principal")
                    .with_provider("icloud")
            })?;
        let principal_url = self.resolve(&principal_href)?;
        debug!(principal = %principal_url, "resolved principal");

        // 2. principal -> calendar home set
        let response = self
            .client
            .propfind(
                principal_url.as_str(),
                &home_set_propfind_body(),
                0,
                username,
                password,
            )
            .await?;
        let home_href = parse_nested_href(&response, "calendar-home-set").ok_or_else(|| {
            ProviderError::malformed("principal response has no calendar home set")
                .with_provider("icloud")
        })?;
        let home_url = self.resolve(&home_href)?;
        debug!(home = %home_url, "resolved calendar home set");

        // 3. home set -> calendar collections
        let response = self
            .client
            .propfind(
                home_url.as_str(),
                &propfind_calendars_body(),
                1,
                username,
                password,
            )
            .await?;
        let calendars = parse_propfind_response(&response);

        if calendars.is_empty() {
            // Some servers expose the home set as a calendar directly
            debug!("no calendar collections found, using home set directly");
            return Ok(vec![home_url]);
        }

        debug!(count = calendars.len(), "discovered calendars");
        calendars
            .iter()
            .map(|c| self.resolve(&c.href))
            .collect::<ProviderResult<Vec<_>>>()
    }

    /// Resolves an href (path or absolute URL) against the base URL.
    fn resolve(&self, href: &str) -> ProviderResult<Url> {
        self.config.base_url.join(href).map_err(|e| {
            ProviderError::malformed(format!("invalid href {href}: {e}")).with_provider("icloud")
        })
    }
}

/// Whether a raw event overlaps the query window.
///
/// An event without an end is treated as ending at its start; all-day
/// boundaries compare at midnight UTC.
fn raw_event_in_window(event: &RawEvent, window: &TimeWindow) -> bool {
    let start = event.start.to_utc_datetime();
    let end = event
        .end
        .as_ref()
        .map(|e| e.to_utc_datetime())
        .unwrap_or(start);
    start < window.end && end > window.start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_event::RawEventTime;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2026, 2, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 6, 0, 0, 0).unwrap(),
        )
    }

    fn timed(h_start: u32, h_end: u32, day: u32) -> RawEvent {
        RawEvent::new(
            "ev",
            RawEventTime::from_datetime(Utc.with_ymd_and_hms(2026, 2, day, h_start, 0, 0).unwrap()),
        )
        .with_end(RawEventTime::from_datetime(
            Utc.with_ymd_and_hms(2026, 2, day, h_end, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn window_filter_keeps_overlapping_events() {
        let w = window();
        assert!(raw_event_in_window(&timed(9, 10, 5), &w));
        assert!(!raw_event_in_window(&timed(9, 10, 7), &w));
    }

    #[test]
    fn window_filter_boundary_touch_is_excluded() {
        // Ends exactly at window start
        let w = TimeWindow::new(
            Utc.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 5, 18, 0, 0).unwrap(),
        );
        assert!(!raw_event_in_window(&timed(9, 10, 5), &w));
    }

    #[test]
    fn window_filter_all_day_on_window_date() {
        let w = window();
        let event = RawEvent::new(
            "ev",
            RawEventTime::from_date(NaiveDate::from_ymd_opt(2026, 2, 5).unwrap()),
        )
        .with_end(RawEventTime::from_date(
            NaiveDate::from_ymd_opt(2026, 2, 6).unwrap(),
        ));
        assert!(raw_event_in_window(&event, &w));

        let next_day = RawEvent::new(
            "ev2",
            RawEventTime::from_date(NaiveDate::from_ymd_opt(2026, 2, 6).unwrap()),
        )
        .with_end(RawEventTime::from_date(
            NaiveDate::from_ymd_opt(2026, 2, 7).unwrap(),
        ));
        assert!(!raw_event_in_window(&next_day, &w));
    }

    #[test]
    fn config_defaults_to_icloud() {
        let config = CalDavConfig::default();
        assert_eq!(config.base_url.as_str(), ICLOUD_CALDAV_URL);
    }

    #[test]
    fn resolve_handles_paths_and_absolute_urls() {
        let adapter = CalDavAdapter::new(CalDavConfig::icloud()).unwrap();

        let path = adapter.resolve("/123456789/principal/").unwrap();
        assert_eq!(
            path.as_str(),
            "https://caldav.icloud.com/123456789/principal/"
        );

        let absolute = adapter
            .resolve("https://p42-caldav.icloud.com/123456789/calendars/")
            .unwrap();
        assert_eq!(
            absolute.as_str(),
            "https://p42-caldav.icloud.com/123456789/calendars/"
        );
    }
}
