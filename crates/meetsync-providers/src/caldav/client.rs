//! HTTP client for CalDAV operations.
//!
//! Handles the WebDAV verbs (PROPFIND, REPORT) with Basic authentication.
//! iCloud app-specific passwords are plain Basic credentials; no Digest
//! negotiation is needed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use tracing::{trace, warn};

use crate::error::{ProviderError, ProviderResult};

/// HTTP client for CalDAV operations.
pub struct CalDavClient {
    client: Client,
}

impl CalDavClient {
    /// Creates a new CalDAV client.
    pub fn new(timeout: Duration, user_agent: &str) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {e}"))
                    .with_provider("icloud")
            })?;

        Ok(Self { client })
    }

    /// Performs a PROPFIND request (discovery and property retrieval).
    pub async fn propfind(
        &self,
        url: &str,
        body: &str,
        depth: u8,
        username: &str,
        password: &str,
    ) -> ProviderResult<String> {
        self.request("PROPFIND", url, body, depth, username, password)
            .await
    }

    /// Performs a REPORT request (calendar-query).
    pub async fn report(
        &self,
        url: &str,
        body: &str,
        username: &str,
        password: &str,
    ) -> ProviderResult<String> {
        self.request("REPORT", url, body, 1, username, password)
            .await
    }

    async fn request(
        &self,
        method: &str,
        url: &str,
        body: &str,
        depth: u8,
        username: &str,
        password: &str,
    ) -> ProviderResult<String> {
        let http_method = Method::from_bytes(method.as_bytes()).map_err(|_| {
            ProviderError::internal(format!("invalid HTTP method: {method}"))
                .with_provider("icloud")
        })?;

        trace!(method = %method, url = %url, "sending caldav request");

        let response = self
            .client
            .request(http_method, url)
            .header("Content-Type", "application/xml; charset=utf-8")
            .header("Depth", depth.to_string())
            .header("Authorization", basic_auth(username, password))
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                let err = if e.is_timeout() {
                    ProviderError::unreachable("request timeout")
                } else {
                    ProviderError::unreachable(format!("request failed: {e}"))
                };
                err.with_provider("icloud")
            })?;

        handle_response(response).await
    }
}

/// Builds a Basic authentication header value.
fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{username}:{password}");
    format!("Basic {}", BASE64.encode(credentials))
}

async fn handle_response(response: Response) -> ProviderResult<String> {
    let status = response.status();
    trace!(status = %status, "received caldav response");

    match status {
        StatusCode::OK | StatusCode::MULTI_STATUS => response.text().await.map_err(|e| {
            ProviderError::unreachable(format!("failed to read response: {e}"))
                .with_provider("icloud")
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::unauthorized(
            "invalid Apple ID or app-specific password",
        )
        .with_provider("icloud")),
        StatusCode::TOO_MANY_REQUESTS => {
            Err(ProviderError::rate_limited("too many requests to server").with_provider("icloud"))
        }
        s if s.is_server_error() => {
            Err(ProviderError::unreachable(format!("server error ({s})")).with_provider("icloud"))
        }
        s => {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %s, "unexpected caldav response status");
            Err(
                ProviderError::malformed(format!("unexpected status {s}: {body}"))
                    .with_provider("icloud"),
            )
        }
    }
}
