//! Crate-level error for a full reconciliation run.

use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::IngestError;
use crate::store::{AggregationQueryError, StoreError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationQueryError),

    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),

    #[error("failed to write csv report: {0}")]
    Csv(#[from] csv::Error),
}
