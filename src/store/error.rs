//! Error types for the record store.

use thiserror::Error;

use super::BatchResult;

/// An ordered upsert batch stopped at its first failing operation.
///
/// Operations before `index` are committed; nothing after it was attempted.
#[derive(Debug, Error)]
#[error("upsert aborted at operation {index} ({committed} before it): {cause}")]
pub struct StoreWriteError {
    pub index: usize,
    pub committed: BatchResult,
    #[source]
    pub cause: WriteFailure,
}

/// Why a single upsert operation failed.
#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("no key fields given")]
    EmptyKey,

    #[error("record has no key field '{0}'")]
    MissingKeyField(String),

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),
}

/// Failure executing a read-only query against the store.
#[derive(Debug, Error)]
pub enum AggregationQueryError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("stored document is corrupt: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("sum of valid deposits overflows")]
    SumOverflow,
}

/// Failure opening, flushing or inspecting a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
