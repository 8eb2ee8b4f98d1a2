//! OAuth 2.0 authorization-code flow for Google APIs.
//!
//! This is the redirect-based web flow: the caller sends the user to
//! [`GoogleOAuth::authorization_url`], Google redirects back to the
//! configured URI with a one-time code, and [`GoogleOAuth::exchange_code`]
//! turns that code into tokens plus the account's identity.
//!
//! Refresh tokens are only issued on first consent (hence
//! `prompt=consent&access_type=offline` in the authorization URL); later
//! grants may carry an access token only.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested at connect time: read-only calendar access plus the
/// identity fields shown in the account list.
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// OAuth client credentials and the registered redirect URI.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// The authenticated Google account's identity, from the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// The result of exchanging an authorization code.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Who the tokens belong to.
    pub identity: GoogleIdentity,
    pub access_token: String,
    /// Present on first consent only.
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: Option<i64>,
}

/// The result of refreshing an access token.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Google occasionally rotates the refresh token itself.
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// OAuth client for the Google token and userinfo endpoints.
#[derive(Debug)]
pub struct GoogleOAuth {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
}

impl GoogleOAuth {
    /// Creates a new OAuth client with the given credentials.
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {e}"))
                    .with_provider("google")
            })?;

        Ok(Self {
            credentials,
            http_client,
        })
    }

    /// Builds the consent-page URL the user should be sent to.
    ///
    /// `state` is round-tripped through the redirect for CSRF protection;
    /// the caller is responsible for verifying it on return.
    pub fn authorization_url(&self, state: &str) -> String {
        let scope = SCOPES.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&\
             access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.credentials.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
        )
    }

    /// Exchanges an authorization code for tokens and fetches the
    /// account's identity.
    pub async fn exchange_code(&self, code: &str) -> ProviderResult<TokenGrant> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];

        let token_response = self.token_request(&params, "token exchange").await?;
        debug!("authorization code exchanged");

        let identity = self.fetch_identity(&token_response.access_token).await?;
        info!(email = %identity.email, "google account authorized");

        Ok(TokenGrant {
            identity,
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_in: token_response.expires_in,
        })
    }

    /// Refreshes an expired access token using the refresh token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> ProviderResult<RefreshedToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.token_request(&params, "token refresh").await?;
        debug!("access token refreshed");

        Ok(RefreshedToken {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_in: token_response.expires_in,
        })
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        context: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::unreachable(format!("{context} request failed: {e}"))
                    .with_provider("google")
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::unreachable(format!("failed to read {context} response: {e}"))
                .with_provider("google")
        })?;

        if !status.is_success() {
            let err = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                ProviderError::rate_limited(format!("{context} throttled"))
            } else if status.is_server_error() {
                ProviderError::unreachable(format!("{context} failed ({status})"))
            } else {
                // invalid_grant, revoked consent, bad client credentials
                ProviderError::unauthorized(format!("{context} failed ({status}): {body}"))
            };
            return Err(err.with_provider("google"));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::malformed(format!("invalid {context} response: {e}"))
                .with_provider("google")
        })
    }

    async fn fetch_identity(&self, access_token: &str) -> ProviderResult<GoogleIdentity> {
        let response = self
            .http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                ProviderError::unreachable(format!("userinfo request failed: {e}"))
                    .with_provider("google")
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(
                ProviderError::unauthorized("userinfo rejected access token")
                    .with_provider("google"),
            );
        }
        if !status.is_success() {
            return Err(
                ProviderError::unreachable(format!("userinfo failed ({status})"))
                    .with_provider("google"),
            );
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::unreachable(format!("failed to read userinfo response: {e}"))
                .with_provider("google")
        })?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::malformed(format!("invalid userinfo response: {e}"))
                .with_provider("google")
        })
    }
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> GoogleOAuth {
        GoogleOAuth::new(
            OAuthCredentials {
                client_id: "test-client.apps.googleusercontent.com".into(),
                client_secret: "shhh".into(),
                redirect_uri: "https://app.example.com/auth/google/callback".into(),
            },
            Duration::from_secs(10),
        )
        .unwrap()
    }

    #[test]
    fn authorization_url_format() {
        let url = oauth().authorization_url("csrf-state-123");

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("client_id=test-client.apps.googleusercontent.com"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("calendar.readonly"));
        assert!(url.contains("state=csrf-state-123"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn token_response_without_refresh_token() {
        let json = r#"{"access_token": "ya29.abc", "expires_in": 3599}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "ya29.abc");
        assert!(parsed.refresh_token.is_none());
        assert_eq!(parsed.expires_in, Some(3599));
    }

    #[test]
    fn identity_parsing() {
        let json = r#"{
            "email": "user@gmail.com",
            "name": "Test User",
            "picture": "https://lh3.googleusercontent.com/a/photo"
        }"#;
        let identity: GoogleIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.email, "user@gmail.com");
        assert_eq!(identity.name.as_deref(), Some("Test User"));

        // name/picture are optional
        let minimal: GoogleIdentity = serde_json::from_str(r#"{"email": "a@b.c"}"#).unwrap();
        assert!(minimal.name.is_none());
        assert!(minimal.picture.is_none());
    }
}
