//! Account connect, disconnect, and status operations.
//!
//! These sit on [`TokenLifecycle`] because connecting an account is where
//! secrets enter the system: every token or password is encrypted through
//! the vault before it touches the registry, and the plaintext is dropped
//! on return.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use meetsync_core::account::{AccountMetadata, Provider};
use meetsync_providers::ProviderResult;
use meetsync_store::NewAccount;

use crate::error::AggregateResult;
use crate::lifecycle::{TokenLifecycle, store_to_provider};

/// One provider's connection state for an owner, for the account list UI.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConnection {
    pub provider: Provider,
    pub connected: bool,
    /// Connected identities, in connection order.
    pub identities: Vec<String>,
}

impl TokenLifecycle {
    /// Builds the Google consent-page URL for a connect flow.
    pub fn google_authorization_url(&self, state: &str) -> String {
        self.oauth().authorization_url(state)
    }

    /// Completes a Google connect flow from the OAuth redirect code.
    ///
    /// Exchanges the code, encrypts the tokens, and upserts the account
    /// row keyed on the Google account's email, so reconnecting the same
    /// account updates it in place. Returns the account id.
    pub async fn connect_google(&self, owner_user_id: &str, code: &str) -> ProviderResult<String> {
        let grant = self.oauth().exchange_code(code).await?;

        let encrypted_secret = self
            .vault()
            .encrypt(&grant.access_token)
            .map_err(store_to_provider)?;
        let encrypted_refresh = match grant.refresh_token.as_deref() {
            Some(token) => Some(self.vault().encrypt(token).map_err(store_to_provider)?),
            None => None,
        };
        let token_expires_at = grant
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        let account_id = self
            .store()
            .upsert_account(&NewAccount {
                owner_user_id,
                provider: Provider::Google,
                external_identity: &grant.identity.email,
                encrypted_secret: &encrypted_secret,
                encrypted_refresh_secret: encrypted_refresh.as_deref(),
                token_expires_at,
                metadata: AccountMetadata {
                    display_name: grant.identity.name.clone(),
                    avatar_url: grant.identity.picture.clone(),
                },
            })
            .map_err(store_to_provider)?;

        info!(account_id = %account_id, "google account connected");
        Ok(account_id)
    }

    /// Connects an iCloud account from an Apple ID and app-specific
    /// password.
    ///
    /// The credentials are verified against the CalDAV server before
    /// anything is stored; a bad password never creates an account row.
    /// Returns the account id.
    pub async fn connect_icloud(
        &self,
        owner_user_id: &str,
        apple_id: &str,
        app_password: &str,
    ) -> ProviderResult<String> {
        self.caldav()
            .verify_credentials(apple_id, app_password)
            .await?;

        let encrypted_secret = self
            .vault()
            .encrypt(app_password)
            .map_err(store_to_provider)?;

        let account_id = self
            .store()
            .upsert_account(&NewAccount {
                owner_user_id,
                provider: Provider::ICloud,
                external_identity: apple_id,
                encrypted_secret: &encrypted_secret,
                encrypted_refresh_secret: None,
                token_expires_at: None,
                metadata: AccountMetadata {
                    display_name: Some(apple_id.to_string()),
                    avatar_url: None,
                },
            })
            .map_err(store_to_provider)?;

        info!(account_id = %account_id, "icloud account connected");
        Ok(account_id)
    }

    /// Removes a connected account and its stored secrets.
    ///
    /// Returns whether an account was actually removed; the provider check
    /// guards against deleting an id that belongs to a different provider.
    pub fn disconnect(&self, account_id: &str, provider: Provider) -> AggregateResult<bool> {
        let deleted = self.store().delete_account(account_id, provider)?;
        if deleted {
            info!(account_id, provider = %provider, "account disconnected");
        }
        Ok(deleted)
    }

    /// Reports the owner's connection state per provider.
    pub fn connection_status(
        &self,
        owner_user_id: &str,
    ) -> AggregateResult<Vec<ProviderConnection>> {
        let accounts = self.store().list_accounts(owner_user_id)?;

        let connections = [Provider::Google, Provider::ICloud]
            .into_iter()
            .map(|provider| {
                let identities: Vec<String> = accounts
                    .iter()
                    .filter(|a| a.provider == provider)
                    .map(|a| a.external_identity.clone())
                    .collect();
                ProviderConnection {
                    provider,
                    connected: !identities.is_empty(),
                    identities,
                }
            })
            .collect();

        Ok(connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use meetsync_providers::caldav::{CalDavAdapter, CalDavConfig};
    use meetsync_providers::google::{GoogleCalendarClient, GoogleOAuth, OAuthCredentials};
    use meetsync_store::{AccountStore, CredentialVault};

    fn lifecycle() -> TokenLifecycle {
        let timeout = StdDuration::from_secs(5);
        TokenLifecycle::new(
            Arc::new(AccountStore::open_in_memory().unwrap()),
            Arc::new(CredentialVault::from_key([7u8; 32])),
            GoogleOAuth::new(
                OAuthCredentials {
                    client_id: "test-client".into(),
                    client_secret: "shhh".into(),
                    redirect_uri: "https://app.example.com/callback".into(),
                },
                timeout,
            )
            .unwrap(),
            GoogleCalendarClient::new(timeout).unwrap(),
            CalDavAdapter::new(CalDavConfig::icloud()).unwrap(),
        )
    }

    fn seed_account(lc: &TokenLifecycle, provider: Provider, identity: &str) -> String {
        lc.store()
            .upsert_account(&NewAccount {
                owner_user_id: "dana",
                provider,
                external_identity: identity,
                encrypted_secret: "blob",
                encrypted_refresh_secret: None,
                token_expires_at: None,
                metadata: AccountMetadata::default(),
            })
            .unwrap()
    }

    #[test]
    fn status_reports_both_providers() {
        let lc = lifecycle();
        seed_account(&lc, Provider::Google, "a@gmail.com");
        seed_account(&lc, Provider::Google, "b@gmail.com");

        let status = lc.connection_status("dana").unwrap();
        assert_eq!(status.len(), 2);

        let google = status.iter().find(|s| s.provider == Provider::Google).unwrap();
        assert!(google.connected);
        assert_eq!(google.identities, vec!["a@gmail.com", "b@gmail.com"]);

        let icloud = status.iter().find(|s| s.provider == Provider::ICloud).unwrap();
        assert!(!icloud.connected);
        assert!(icloud.identities.is_empty());
    }

    #[test]
    fn disconnect_removes_the_row() {
        let lc = lifecycle();
        let id = seed_account(&lc, Provider::ICloud, "a@icloud.com");

        // Provider mismatch leaves the account alone.
        assert!(!lc.disconnect(&id, Provider::Google).unwrap());
        assert!(lc.disconnect(&id, Provider::ICloud).unwrap());
        assert!(!lc.disconnect(&id, Provider::ICloud).unwrap());

        let status = lc.connection_status("dana").unwrap();
        assert!(status.iter().all(|s| !s.connected));
    }

    #[test]
    fn authorization_url_comes_from_oauth_config() {
        let url = lifecycle().google_authorization_url("state-1");
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("state=state-1"));
    }
}
