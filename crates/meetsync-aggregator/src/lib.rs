//! Aggregation engine: token lifecycle, concurrent per-owner fan-out, and
//! account connect operations.

pub mod connect;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;

pub use connect::ProviderConnection;
pub use error::{AggregateError, AggregateResult};
pub use lifecycle::{AccountFetcher, BoxFuture, TokenLifecycle};
pub use orchestrator::{AccountFetchStatus, AggregateOutcome, Aggregator, AggregatorConfig};
