//! Aggregation error types.

use thiserror::Error;

use meetsync_providers::ProviderError;
use meetsync_store::StoreError;

/// Result type for aggregation operations.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Errors from the aggregation layer.
///
/// Store errors are fatal to the whole operation; provider errors only
/// reach this type on single-account calls, since the fan-out path folds
/// them into per-account statuses instead.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
