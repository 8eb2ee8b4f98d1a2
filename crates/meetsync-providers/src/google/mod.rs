//! Google Calendar adapter: OAuth 2.0 web flow and events API client.

pub mod client;
pub mod oauth;

pub use client::GoogleCalendarClient;
pub use oauth::{GoogleIdentity, GoogleOAuth, OAuthCredentials, RefreshedToken, TokenGrant};
