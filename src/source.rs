//! Ledger sources: where pages of transaction records come from.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{Cursor, TransactionRecord};

/// Errors that can occur when fetching a page.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    #[error("failed to read page {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse page {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("ledger source unavailable: {0}")]
    Unavailable(String),
}

/// One page of records plus the cursor to continue from.
///
/// Wire form follows a `listsinceblock` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(rename = "transactions", default)]
    pub records: Vec<TransactionRecord>,
    #[serde(rename = "lastblock", default)]
    pub next_cursor: Option<Cursor>,
}

/// Producer of transaction pages.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Fetch the page following `cursor`; `None` means start of history.
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Page, SourceFetchError>;
}

/// Stand-in source that serves two pre-baked pages from a directory.
///
/// Without a cursor it serves `transactions-1.json`, with any cursor
/// `transactions-2.json`.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub const FIRST_PAGE: &'static str = "transactions-1.json";
    pub const NEXT_PAGE: &'static str = "transactions-2.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl LedgerSource for FixtureSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Page, SourceFetchError> {
        let file = match cursor {
            None => Self::FIRST_PAGE,
            Some(_) => Self::NEXT_PAGE,
        };
        let path = self.dir.join(file);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| SourceFetchError::Read {
                path: path.clone(),
                source,
            })?;
        let page: Page = serde_json::from_slice(&bytes)
            .map_err(|source| SourceFetchError::Parse { path, source })?;

        debug!(file, records = page.records.len(), "fixture page loaded");
        Ok(page)
    }
}
