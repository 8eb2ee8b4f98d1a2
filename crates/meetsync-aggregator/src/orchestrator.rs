//! Per-owner aggregation fan-out.
//!
//! [`Aggregator`] fetches events for every connected account of an owner
//! concurrently, bounds each fetch with a deadline, and reports a status
//! per account so one broken provider never hides the others.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use meetsync_core::account::{CalendarAccount, Provider};
use meetsync_core::event::CanonicalEvent;
use meetsync_core::time::TimeWindow;
use meetsync_providers::{ProviderError, ProviderErrorKind};
use meetsync_store::AccountStore;

use crate::error::AggregateResult;
use crate::lifecycle::AccountFetcher;

/// Tuning knobs for the fan-out.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Deadline for each account's fetch, refresh included.
    pub request_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// Per-account outcome of one aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct AccountFetchStatus {
    pub account_id: String,
    pub provider: Provider,
    /// `None` when the fetch succeeded.
    pub error: Option<ProviderErrorKind>,
    pub detail: Option<String>,
}

impl AccountFetchStatus {
    fn ok(account: &CalendarAccount) -> Self {
        Self {
            account_id: account.id.clone(),
            provider: account.provider,
            error: None,
            detail: None,
        }
    }

    fn failed(account: &CalendarAccount, err: &ProviderError) -> Self {
        Self {
            account_id: account.id.clone(),
            provider: account.provider,
            error: Some(err.kind()),
            detail: Some(err.message().to_string()),
        }
    }

    /// Whether the account's fetch succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Events plus per-account statuses from one aggregation run.
#[derive(Debug, Serialize)]
pub struct AggregateOutcome {
    /// All fetched events, sorted by start time.
    pub events: Vec<CanonicalEvent>,
    /// One status per account, in store order.
    pub statuses: Vec<AccountFetchStatus>,
}

impl AggregateOutcome {
    /// Whether every account fetch succeeded.
    pub fn is_complete(&self) -> bool {
        self.statuses.iter().all(AccountFetchStatus::is_ok)
    }
}

/// Concurrent multi-account event aggregator.
pub struct Aggregator {
    store: Arc<AccountStore>,
    fetcher: Arc<dyn AccountFetcher>,
    config: AggregatorConfig,
}

impl Aggregator {
    /// Creates an aggregator over the given store and fetcher.
    pub fn new(
        store: Arc<AccountStore>,
        fetcher: Arc<dyn AccountFetcher>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Fetches events for every account of the owner within the window.
    ///
    /// Accounts are fetched concurrently; a failing account contributes an
    /// error status and no events. Only a store failure aborts the run.
    pub async fn get_all_events(
        &self,
        owner_user_id: &str,
        window: &TimeWindow,
    ) -> AggregateResult<AggregateOutcome> {
        let accounts = self.store.list_accounts(owner_user_id)?;
        debug!(
            owner = owner_user_id,
            accounts = accounts.len(),
            "aggregating events"
        );

        let fetches = accounts
            .iter()
            .map(|account| self.fetch_with_deadline(account, window));
        let results = join_all(fetches).await;

        let mut events = Vec::new();
        let mut statuses = Vec::with_capacity(accounts.len());
        for (account, result) in accounts.iter().zip(results) {
            match result {
                Ok(fetched) => {
                    events.extend(fetched);
                    statuses.push(AccountFetchStatus::ok(account));
                }
                Err(err) => {
                    warn!(
                        account_id = %account.id,
                        provider = %account.provider,
                        error = %err,
                        "account fetch failed"
                    );
                    statuses.push(AccountFetchStatus::failed(account, &err));
                }
            }
        }

        events.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.account_id.cmp(&b.account_id))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(AggregateOutcome { events, statuses })
    }

    /// Fetches events for a single account within the window.
    pub async fn get_events_for_account(
        &self,
        account_id: &str,
        window: &TimeWindow,
    ) -> AggregateResult<Vec<CanonicalEvent>> {
        let account = self
            .store
            .get_account(account_id)?
            .ok_or_else(|| meetsync_store::StoreError::account_not_found(account_id))?;
        let events = self.fetch_with_deadline(&account, window).await?;
        Ok(events)
    }

    async fn fetch_with_deadline(
        &self,
        account: &CalendarAccount,
        window: &TimeWindow,
    ) -> Result<Vec<CanonicalEvent>, ProviderError> {
        match tokio::time::timeout(
            self.config.request_timeout,
            self.fetcher.fetch_events(account, window),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::unreachable("deadline exceeded")
                .with_provider(account.provider.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::BoxFuture;
    use chrono::{NaiveDate, TimeZone, Utc};
    use meetsync_core::account::AccountMetadata;
    use meetsync_core::slot::{all_day_events_on, busy_hours};
    use meetsync_core::time::EventTime;
    use meetsync_providers::ProviderResult;
    use meetsync_store::NewAccount;

    struct StubFetcher {
        responses: Vec<(String, ProviderResult<Vec<CanonicalEvent>>)>,
    }

    impl AccountFetcher for StubFetcher {
        fn fetch_events<'a>(
            &'a self,
            account: &'a CalendarAccount,
            _window: &'a TimeWindow,
        ) -> BoxFuture<'a, ProviderResult<Vec<CanonicalEvent>>> {
            let response = self
                .responses
                .iter()
                .find(|(id, _)| *id == account.id)
                .map(|(_, r)| match r {
                    Ok(events) => Ok(events.clone()),
                    Err(e) => Err(ProviderError::new(e.kind(), e.message().to_string())),
                })
                .unwrap_or_else(|| Ok(Vec::new()));
            Box::pin(async move { response })
        }
    }

    struct SleepingFetcher;

    impl AccountFetcher for SleepingFetcher {
        fn fetch_events<'a>(
            &'a self,
            _account: &'a CalendarAccount,
            _window: &'a TimeWindow,
        ) -> BoxFuture<'a, ProviderResult<Vec<CanonicalEvent>>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            })
        }
    }

    fn store_with_accounts(specs: &[(&str, Provider, &str)]) -> (Arc<AccountStore>, Vec<String>) {
        let store = Arc::new(AccountStore::open_in_memory().unwrap());
        let ids = specs
            .iter()
            .map(|(owner, provider, identity)| {
                store
                    .upsert_account(&NewAccount {
                        owner_user_id: owner,
                        provider: *provider,
                        external_identity: identity,
                        encrypted_secret: "blob",
                        encrypted_refresh_secret: None,
                        token_expires_at: None,
                        metadata: AccountMetadata::default(),
                    })
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    fn timed_event(account_id: &str, id: &str, hour: u32, end_hour: u32) -> CanonicalEvent {
        CanonicalEvent::new(
            id,
            account_id,
            EventTime::from_utc(Utc.with_ymd_and_hms(2026, 2, 5, hour, 0, 0).unwrap()),
            EventTime::from_utc(Utc.with_ymd_and_hms(2026, 2, 5, end_hour, 0, 0).unwrap()),
        )
    }

    fn day_window() -> TimeWindow {
        TimeWindow::for_date(NaiveDate::from_ymd_opt(2026, 2, 5).unwrap(), &Utc)
    }

    #[tokio::test]
    async fn partial_failure_keeps_healthy_accounts() {
        let (store, ids) = store_with_accounts(&[
            ("dana", Provider::Google, "a@gmail.com"),
            ("dana", Provider::Google, "b@gmail.com"),
            ("dana", Provider::ICloud, "c@icloud.com"),
        ]);
        let fetcher = Arc::new(StubFetcher {
            responses: vec![
                (ids[0].clone(), Ok(vec![timed_event(&ids[0], "e1", 9, 10)])),
                (
                    ids[1].clone(),
                    Err(ProviderError::unreachable("connection refused")),
                ),
                (ids[2].clone(), Ok(vec![timed_event(&ids[2], "e2", 14, 15)])),
            ],
        });
        let aggregator = Aggregator::new(store, fetcher, AggregatorConfig::default());

        let outcome = aggregator
            .get_all_events("dana", &day_window())
            .await
            .unwrap();

        assert_eq!(outcome.events.len(), 2);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.statuses.len(), 3);

        let failed: Vec<_> = outcome.statuses.iter().filter(|s| !s.is_ok()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error, Some(ProviderErrorKind::Unreachable));
        assert_eq!(failed[0].detail.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn events_from_all_providers_merge_sorted() {
        let (store, ids) = store_with_accounts(&[
            ("dana", Provider::Google, "a@gmail.com"),
            ("dana", Provider::ICloud, "c@icloud.com"),
        ]);
        let all_day = CanonicalEvent::new(
            "holiday",
            &ids[1],
            EventTime::from_date(NaiveDate::from_ymd_opt(2026, 2, 5).unwrap()),
            EventTime::from_date(NaiveDate::from_ymd_opt(2026, 2, 6).unwrap()),
        )
        .with_title("Holiday");
        let fetcher = Arc::new(StubFetcher {
            responses: vec![
                (
                    ids[0].clone(),
                    Ok(vec![
                        timed_event(&ids[0], "standup", 14, 15),
                        timed_event(&ids[0], "review", 9, 10),
                    ]),
                ),
                (ids[1].clone(), Ok(vec![all_day])),
            ],
        });
        let aggregator = Aggregator::new(store, fetcher, AggregatorConfig::default());

        let outcome = aggregator
            .get_all_events("dana", &day_window())
            .await
            .unwrap();
        assert!(outcome.is_complete());

        let starts: Vec<_> = outcome.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(starts, vec!["holiday", "review", "standup"]);

        let date = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        let mask = busy_hours(&outcome.events, date);
        assert!(mask[9] && mask[14]);
        assert!(!mask[10] && !mask[13]);
        assert_eq!(all_day_events_on(&outcome.events, date).len(), 1);
    }

    #[tokio::test]
    async fn unknown_owner_yields_empty_outcome() {
        let (store, _) = store_with_accounts(&[("dana", Provider::Google, "a@gmail.com")]);
        let fetcher = Arc::new(StubFetcher { responses: vec![] });
        let aggregator = Aggregator::new(store, fetcher, AggregatorConfig::default());

        let outcome = aggregator
            .get_all_events("nobody", &day_window())
            .await
            .unwrap();
        assert!(outcome.events.is_empty());
        assert!(outcome.statuses.is_empty());
        assert!(outcome.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_account_hits_the_deadline() {
        let (store, _) = store_with_accounts(&[("dana", Provider::Google, "a@gmail.com")]);
        let aggregator = Aggregator::new(
            store,
            Arc::new(SleepingFetcher),
            AggregatorConfig {
                request_timeout: Duration::from_secs(20),
            },
        );

        let outcome = aggregator
            .get_all_events("dana", &day_window())
            .await
            .unwrap();

        assert_eq!(outcome.statuses.len(), 1);
        assert_eq!(
            outcome.statuses[0].error,
            Some(ProviderErrorKind::Unreachable)
        );
        assert_eq!(outcome.statuses[0].detail.as_deref(), Some("deadline exceeded"));
    }

    #[tokio::test]
    async fn single_account_fetch_propagates_provider_errors() {
        let (store, ids) = store_with_accounts(&[("dana", Provider::Google, "a@gmail.com")]);
        let fetcher = Arc::new(StubFetcher {
            responses: vec![(
                ids[0].clone(),
                Err(ProviderError::unauthorized("token revoked")),
            )],
        });
        let aggregator = Aggregator::new(store, fetcher, AggregatorConfig::default());

        let err = aggregator
            .get_events_for_account(&ids[0], &day_window())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AggregateError::Provider(_)));
    }
}
