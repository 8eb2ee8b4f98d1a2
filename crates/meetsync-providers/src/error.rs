//! Error types for provider operations.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The category of a provider error.
///
/// A deliberately small taxonomy: callers branch on these kinds for retry
/// and status reporting, so every HTTP status and parse failure is mapped
/// onto one of them at the adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Credentials are invalid, expired, or were revoked. The account
    /// needs to be reconnected (or its token refreshed).
    Unauthorized,
    /// The provider throttled us; retry after backing off.
    RateLimited,
    /// The provider could not be reached: connect failure, timeout, DNS,
    /// or a server-side outage.
    Unreachable,
    /// The provider returned a payload we could not interpret.
    Malformed,
    /// A stored secret failed decryption; the account must be reconnected.
    CorruptSecret,
    /// Missing or invalid adapter configuration.
    Configuration,
    /// Unexpected internal state.
    Internal,
}

impl ProviderErrorKind {
    /// Whether the operation may succeed if simply retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable | Self::RateLimited)
    }

    /// Stable lowercase name, used in logs and status payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::Unreachable => "unreachable",
            Self::Malformed => "malformed",
            Self::CorruptSecret => "corrupt_secret",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a provider adapter.
#[derive(Debug, Error)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    /// The provider that produced this error (e.g. "google", "icloud").
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given kind and message.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unauthorized, message)
    }

    /// Creates a rate-limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    /// Creates an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unreachable, message)
    }

    /// Creates a malformed-payload error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Malformed, message)
    }

    /// Creates a corrupt-secret error.
    pub fn corrupt_secret(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::CorruptSecret, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Configuration, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Internal, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Whether the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        assert!(ProviderErrorKind::Unreachable.is_retryable());
        assert!(ProviderErrorKind::RateLimited.is_retryable());
        assert!(!ProviderErrorKind::Unauthorized.is_retryable());
        assert!(!ProviderErrorKind::Malformed.is_retryable());
        assert!(!ProviderErrorKind::CorruptSecret.is_retryable());
    }

    #[test]
    fn error_creation() {
        let err = ProviderError::unauthorized("token expired");
        assert_eq!(err.kind(), ProviderErrorKind::Unauthorized);
        assert_eq!(err.message(), "token expired");
        assert!(err.provider().is_none());
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_includes_provider_tag() {
        let err = ProviderError::rate_limited("too many requests").with_provider("icloud");
        let display = format!("{err}");
        assert!(display.contains("[icloud]"));
        assert!(display.contains("rate_limited"));
        assert!(display.contains("too many requests"));
    }

    #[test]
    fn source_chain() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = ProviderError::unreachable("request failed").with_source(io_err);
        assert!(err.source().is_some());
    }
}
