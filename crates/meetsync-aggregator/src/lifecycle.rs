//! Token and session lifecycle.
//!
//! [`TokenLifecycle`] turns a stored account row into canonical events:
//! it decrypts secrets on use, refreshes expired Google access tokens
//! (proactively via the stored expiry, plus one retry on a 401), and
//! persists rotated tokens before any result is returned, so a crash
//! after refresh never strands a revoked token in the registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use meetsync_core::account::{CalendarAccount, Provider};
use meetsync_core::event::CanonicalEvent;
use meetsync_core::time::TimeWindow;
use meetsync_providers::caldav::CalDavAdapter;
use meetsync_providers::google::{GoogleCalendarClient, GoogleOAuth};
use meetsync_providers::normalize_events;
use meetsync_providers::{ProviderError, ProviderResult};
use meetsync_store::{AccountStore, CredentialVault, StoreError};

/// A boxed future, for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches canonical events for one account.
///
/// The orchestrator fans out over this trait, which keeps it testable
/// without live provider credentials.
pub trait AccountFetcher: Send + Sync {
    /// Fetches and normalizes the account's events within the window.
    fn fetch_events<'a>(
        &'a self,
        account: &'a CalendarAccount,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<CanonicalEvent>>>;
}

/// Refresh this long before the recorded expiry, to absorb clock skew
/// and request latency.
fn expiry_margin() -> Duration {
    Duration::seconds(60)
}

/// Whether the stored access token should be refreshed before use.
///
/// An account without a recorded expiry is assumed valid; a 401 from the
/// API still triggers a refresh.
pub fn token_needs_refresh(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| at - expiry_margin() <= now)
}

/// Provider-dispatching event fetcher with token refresh.
pub struct TokenLifecycle {
    store: Arc<AccountStore>,
    vault: Arc<CredentialVault>,
    oauth: GoogleOAuth,
    calendar: GoogleCalendarClient,
    caldav: CalDavAdapter,
}

impl TokenLifecycle {
    /// Creates a new lifecycle manager.
    pub fn new(
        store: Arc<AccountStore>,
        vault: Arc<CredentialVault>,
        oauth: GoogleOAuth,
        calendar: GoogleCalendarClient,
        caldav: CalDavAdapter,
    ) -> Self {
        Self {
            store,
            vault,
            oauth,
            calendar,
            caldav,
        }
    }

    pub(crate) fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    pub(crate) fn vault(&self) -> &Arc<CredentialVault> {
        &self.vault
    }

    pub(crate) fn oauth(&self) -> &GoogleOAuth {
        &self.oauth
    }

    pub(crate) fn caldav(&self) -> &CalDavAdapter {
        &self.caldav
    }

    async fn fetch_google(
        &self,
        account: &CalendarAccount,
        window: &TimeWindow,
    ) -> ProviderResult<Vec<CanonicalEvent>> {
        let mut access_token = self
            .vault
            .decrypt(&account.encrypted_secret)
            .map_err(store_to_provider)?;

        if token_needs_refresh(account.token_expires_at, Utc::now()) {
            debug!(account_id = %account.id, "access token expired, refreshing");
            access_token = self.refresh_and_persist(account).await?;
        }

        match self
            .calendar
            .list_events(&access_token, "primary", window)
            .await
        {
            Ok(raws) => Ok(normalize_events(&account.id, &raws)),
            Err(e) if e.kind() == meetsync_providers::ProviderErrorKind::Unauthorized => {
                // The stored expiry can be stale; refresh once and retry.
                debug!(account_id = %account.id, "got 401, refreshing and retrying");
                let access_token = self.refresh_and_persist(account).await?;
                let raws = self
                    .calendar
                    .list_events(&access_token, "primary", window)
                    .await?;
                Ok(normalize_events(&account.id, &raws))
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_caldav(
        &self,
        account: &CalendarAccount,
        window: &TimeWindow,
    ) -> ProviderResult<Vec<CanonicalEvent>> {
        let password = self
            .vault
            .decrypt(&account.encrypted_secret)
            .map_err(store_to_provider)?;

        let raws = self
            .caldav
            .fetch_events(&account.external_identity, &password, window)
            .await?;
        Ok(normalize_events(&account.id, &raws))
    }

    /// Refreshes the Google access token and persists the rotation.
    ///
    /// The registry is updated before the new token is handed to the
    /// caller. A refresh response without a new refresh token leaves the
    /// stored refresh secret untouched.
    async fn refresh_and_persist(&self, account: &CalendarAccount) -> ProviderResult<String> {
        let refresh_blob = account.encrypted_refresh_secret.as_ref().ok_or_else(|| {
            ProviderError::unauthorized("no refresh token stored; reconnect the account")
                .with_provider("google")
        })?;
        let refresh_token = self.vault.decrypt(refresh_blob).map_err(store_to_provider)?;

        let refreshed = self.oauth.refresh_access_token(&refresh_token).await?;

        let encrypted_access = self
            .vault
            .encrypt(&refreshed.access_token)
            .map_err(store_to_provider)?;
        let encrypted_refresh = match refreshed.refresh_token.as_deref() {
            Some(token) => Some(self.vault.encrypt(token).map_err(store_to_provider)?),
            None => None,
        };
        let expires_at = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        self.store
            .update_tokens(
                &account.id,
                &encrypted_access,
                encrypted_refresh.as_deref(),
                expires_at,
            )
            .map_err(store_to_provider)?;

        info!(account_id = %account.id, "persisted refreshed google tokens");
        Ok(refreshed.access_token)
    }
}

impl AccountFetcher for TokenLifecycle {
    fn fetch_events<'a>(
        &'a self,
        account: &'a CalendarAccount,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<CanonicalEvent>>> {
        Box::pin(async move {
            match account.provider {
                Provider::Google => self.fetch_google(account, window).await,
                Provider::ICloud => self.fetch_caldav(account, window).await,
            }
        })
    }
}

/// Maps store failures onto the provider taxonomy at the fetch boundary.
pub(crate) fn store_to_provider(err: StoreError) -> ProviderError {
    match err {
        StoreError::CorruptSecret(msg) => {
            warn!("stored secret is corrupt, account needs reconnection");
            ProviderError::corrupt_secret(msg)
        }
        other => ProviderError::internal("account store failure").with_source(other),
    }
}
