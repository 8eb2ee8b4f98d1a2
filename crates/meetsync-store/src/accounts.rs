//! Durable account registry backed by SQLite.
//!
//! One row per connected account, unique on `(owner_user_id, provider,
//! external_identity)`. Reconnecting the same identity updates secrets in
//! place instead of creating a duplicate row, and a missing refresh token
//! on reconnect never clobbers a previously stored one.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use meetsync_core::account::{AccountMetadata, CalendarAccount, Provider};

use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calendar_accounts (
    id TEXT PRIMARY KEY,
    owner_user_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    external_identity TEXT NOT NULL,
    encrypted_secret TEXT NOT NULL,
    encrypted_refresh_secret TEXT,
    token_expires_at TEXT,
    display_name TEXT,
    avatar_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(owner_user_id, provider, external_identity)
);
CREATE INDEX IF NOT EXISTS idx_accounts_owner
    ON calendar_accounts(owner_user_id);
";

/// Parameters for connecting (or reconnecting) an account.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub owner_user_id: &'a str,
    pub provider: Provider,
    pub external_identity: &'a str,
    /// Vault blob for the access token or app-specific password.
    pub encrypted_secret: &'a str,
    /// Vault blob for the refresh token, when the provider issued one.
    pub encrypted_refresh_secret: Option<&'a str>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub metadata: AccountMetadata,
}

/// SQLite-backed registry of connected calendar accounts.
pub struct AccountStore {
    conn: Mutex<Connection>,
}

impl AccountStore {
    /// Opens (or creates) the registry at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory registry.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts a new account or updates the existing row for the same
    /// `(owner, provider, identity)` triple. Returns the surviving row id.
    ///
    /// On conflict the stored refresh secret is only replaced when the new
    /// connection actually carries one.
    pub fn upsert_account(&self, account: &NewAccount<'_>) -> StoreResult<String> {
        let conn = self.conn.lock().expect("account store mutex poisoned");
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let row_id: String = conn.query_row(
            "INSERT INTO calendar_accounts (
                id, owner_user_id, provider, external_identity,
                encrypted_secret, encrypted_refresh_secret, token_expires_at,
                display_name, avatar_url, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(owner_user_id, provider, external_identity) DO UPDATE SET
                encrypted_secret = excluded.encrypted_secret,
                encrypted_refresh_secret = COALESCE(
                    excluded.encrypted_refresh_secret,
                    calendar_accounts.encrypted_refresh_secret),
                token_expires_at = excluded.token_expires_at,
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                id,
                account.owner_user_id,
                account.provider.as_str(),
                account.external_identity,
                account.encrypted_secret,
                account.encrypted_refresh_secret,
                account.token_expires_at,
                account.metadata.display_name,
                account.metadata.avatar_url,
                now,
            ],
            |row| row.get(0),
        )?;
        debug!(
            account_id = %row_id,
            provider = %account.provider,
            "account upserted"
        );
        Ok(row_id)
    }

    /// Looks up a single account by id.
    pub fn get_account(&self, account_id: &str) -> StoreResult<Option<CalendarAccount>> {
        let conn = self.conn.lock().expect("account store mutex poisoned");
        let account = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![account_id],
                map_account,
            )
            .optional()?;
        Ok(account)
    }

    /// Lists every account belonging to an owner.
    pub fn list_accounts(&self, owner_user_id: &str) -> StoreResult<Vec<CalendarAccount>> {
        let conn = self.conn.lock().expect("account store mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE owner_user_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![owner_user_id], map_account)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Lists an owner's accounts for one provider.
    pub fn list_accounts_by_provider(
        &self,
        owner_user_id: &str,
        provider: Provider,
    ) -> StoreResult<Vec<CalendarAccount>> {
        let conn = self.conn.lock().expect("account store mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE owner_user_id = ?1 AND provider = ?2 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![owner_user_id, provider.as_str()], map_account)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Removes an account. Returns whether a row was actually deleted.
    pub fn delete_account(&self, account_id: &str, provider: Provider) -> StoreResult<bool> {
        let conn = self.conn.lock().expect("account store mutex poisoned");
        let deleted = conn.execute(
            "DELETE FROM calendar_accounts WHERE id = ?1 AND provider = ?2",
            params![account_id, provider.as_str()],
        )?;
        Ok(deleted > 0)
    }

    /// Persists rotated tokens for an account.
    ///
    /// A `None` refresh secret leaves the stored one untouched; refresh
    /// tokens are long-lived and most rotations only reissue the access
    /// token.
    pub fn update_tokens(
        &self,
        account_id: &str,
        encrypted_secret: &str,
        encrypted_refresh_secret: Option<&str>,
        token_expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().expect("account store mutex poisoned");
        let updated = conn.execute(
            "UPDATE calendar_accounts SET
                encrypted_secret = ?1,
                encrypted_refresh_secret = COALESCE(?2, encrypted_refresh_secret),
                token_expires_at = ?3,
                updated_at = ?4
             WHERE id = ?5",
            params![
                encrypted_secret,
                encrypted_refresh_secret,
                token_expires_at,
                Utc::now(),
                account_id,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::account_not_found(account_id));
        }
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT
    id, owner_user_id, provider, external_identity,
    encrypted_secret, encrypted_refresh_secret, token_expires_at,
    display_name, avatar_url, created_at, updated_at
 FROM calendar_accounts";

fn map_account(row: &Row<'_>) -> rusqlite::Result<CalendarAccount> {
    let provider_str: String = row.get(2)?;
    let provider = Provider::from_str(&provider_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(CalendarAccount {
        id: row.get(0)?,
        owner_user_id: row.get(1)?,
        provider,
        external_identity: row.get(3)?,
        encrypted_secret: row.get(4)?,
        encrypted_refresh_secret: row.get(5)?,
        token_expires_at: row.get(6)?,
        metadata: AccountMetadata {
            display_name: row.get(7)?,
            avatar_url: row.get(8)?,
        },
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account<'a>(owner: &'a str, provider: Provider, identity: &'a str) -> NewAccount<'a> {
        NewAccount {
            owner_user_id: owner,
            provider,
            external_identity: identity,
            encrypted_secret: "blob-access-1",
            encrypted_refresh_secret: Some("blob-refresh-1"),
            token_expires_at: None,
            metadata: AccountMetadata::default(),
        }
    }

    #[test]
    fn upsert_is_keyed_on_owner_provider_identity() {
        let store = AccountStore::open_in_memory().unwrap();

        let first = store
            .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
            .unwrap();

        let mut reconnect = new_account("user-1", Provider::Google, "a@gmail.com");
        reconnect.encrypted_secret = "blob-access-2";
        let second = store.upsert_account(&reconnect).unwrap();

        // Same row survives, with the newer secret.
        assert_eq!(first, second);
        let accounts = store.list_accounts("user-1").unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].encrypted_secret, "blob-access-2");
    }

    #[test]
    fn reconnect_without_refresh_token_keeps_stored_one() {
        let store = AccountStore::open_in_memory().unwrap();
        let id = store
            .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
            .unwrap();

        // Google only returns a refresh token on first consent.
        let mut reconnect = new_account("user-1", Provider::Google, "a@gmail.com");
        reconnect.encrypted_refresh_secret = None;
        store.upsert_account(&reconnect).unwrap();

        let account = store.get_account(&id).unwrap().unwrap();
        assert_eq!(
            account.encrypted_refresh_secret.as_deref(),
            Some("blob-refresh-1")
        );
    }

    #[test]
    fn same_identity_different_owner_gets_its_own_row() {
        let store = AccountStore::open_in_memory().unwrap();
        let a = store
            .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
            .unwrap();
        let b = store
            .upsert_account(&new_account("user-2", Provider::Google, "a@gmail.com"))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn update_tokens_preserves_refresh_when_not_reissued() {
        let store = AccountStore::open_in_memory().unwrap();
        let id = store
            .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
            .unwrap();

        let expires = Utc::now() + chrono::Duration::hours(1);
        store
            .update_tokens(&id, "blob-access-2", None, Some(expires))
            .unwrap();

        let account = store.get_account(&id).unwrap().unwrap();
        assert_eq!(account.encrypted_secret, "blob-access-2");
        assert_eq!(
            account.encrypted_refresh_secret.as_deref(),
            Some("blob-refresh-1")
        );
        assert_eq!(account.token_expires_at, Some(expires));
    }

    #[test]
    fn update_tokens_stores_newly_issued_refresh() {
        let store = AccountStore::open_in_memory().unwrap();
        let id = store
            .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
            .unwrap();

        store
            .update_tokens(&id, "blob-access-2", Some("blob-refresh-2"), None)
            .unwrap();

        let account = store.get_account(&id).unwrap().unwrap();
        assert_eq!(
            account.encrypted_refresh_secret.as_deref(),
            Some("blob-refresh-2")
        );
    }

    #[test]
    fn update_tokens_on_missing_account_fails() {
        let store = AccountStore::open_in_memory().unwrap();
        let err = store
            .update_tokens("no-such-id", "blob", None, None)
            .unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound { .. }));
    }

    #[test]
    fn delete_reports_whether_a_row_existed() {
        let store = AccountStore::open_in_memory().unwrap();
        let id = store
            .upsert_account(&new_account("user-1", Provider::ICloud, "a@icloud.com"))
            .unwrap();

        // Wrong provider: nothing deleted.
        assert!(!store.delete_account(&id, Provider::Google).unwrap());
        assert!(store.delete_account(&id, Provider::ICloud).unwrap());
        assert!(!store.delete_account(&id, Provider::ICloud).unwrap());
        assert!(store.get_account(&id).unwrap().is_none());
    }

    #[test]
    fn list_by_provider_filters() {
        let store = AccountStore::open_in_memory().unwrap();
        store
            .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
            .unwrap();
        store
            .upsert_account(&new_account("user-1", Provider::ICloud, "a@icloud.com"))
            .unwrap();
        store
            .upsert_account(&new_account("user-2", Provider::Google, "b@gmail.com"))
            .unwrap();

        assert_eq!(store.list_accounts("user-1").unwrap().len(), 2);
        let google = store
            .list_accounts_by_provider("user-1", Provider::Google)
            .unwrap();
        assert_eq!(google.len(), 1);
        assert_eq!(google[0].external_identity, "a@gmail.com");
    }

    #[test]
    fn registry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.db");

        let id = {
            let store = AccountStore::open(&path).unwrap();
            store
                .upsert_account(&new_account("user-1", Provider::Google, "a@gmail.com"))
                .unwrap()
        };

        let store = AccountStore::open(&path).unwrap();
        let account = store.get_account(&id).unwrap().unwrap();
        assert_eq!(account.external_identity, "a@gmail.com");
        assert_eq!(account.provider, Provider::Google);
    }
}
