//! Connected calendar accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The calendar providers this engine can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Calendar (OAuth 2.0 authorization-code flow).
    Google,
    /// iCloud calendars over CalDAV (app-specific password).
    ICloud,
}

impl Provider {
    /// Stable string form, used as the database discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::ICloud => "icloud",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "icloud" => Ok(Self::ICloud),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Cosmetic account details captured at connect time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMetadata {
    /// Human-readable account name, when the provider exposes one.
    pub display_name: Option<String>,
    /// Avatar URL, when the provider exposes one.
    pub avatar_url: Option<String>,
}

/// A connected calendar account as stored in the account registry.
///
/// Secrets are present only in encrypted form; the plaintext never leaves
/// the vault boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAccount {
    /// Internal account identifier (UUID).
    pub id: String,
    /// The user this account belongs to.
    pub owner_user_id: String,
    /// Which provider the account connects to.
    pub provider: Provider,
    /// Provider-side identity: Google email or iCloud Apple ID.
    pub external_identity: String,
    /// Encrypted primary secret: OAuth access token or app-specific password.
    pub encrypted_secret: String,
    /// Encrypted refresh token, for providers that issue one.
    pub encrypted_refresh_secret: Option<String>,
    /// When the primary secret expires, for providers with expiring tokens.
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Cosmetic details.
    pub metadata: AccountMetadata,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_roundtrip() {
        for p in [Provider::Google, Provider::ICloud] {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
        assert!("outlook".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Google).unwrap(), "\"google\"");
        assert_eq!(serde_json::to_string(&Provider::ICloud).unwrap(), "\"icloud\"");
        let parsed: Provider = serde_json::from_str("\"icloud\"").unwrap();
        assert_eq!(parsed, Provider::ICloud);
    }
}
