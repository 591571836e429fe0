use std::fmt;

use serde::Deserialize;

use crate::model::Cursor;
use crate::store::{BatchResult, StoreWriteError};

/// Where the ingestion loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestState {
    #[default]
    Idle,
    Fetching,
    Applying,
    Terminated,
}

impl fmt::Display for IngestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestState::Idle => "idle",
            IngestState::Fetching => "fetching",
            IngestState::Applying => "applying",
            IngestState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned a page with no records.
    EmptyPage,
    /// The source returned no continuation cursor.
    NoCursor,
    /// The source handed back the cursor it was given.
    CursorUnchanged,
    /// `max_pages` pages were applied.
    PageLimit,
    /// Shutdown was requested.
    Cancelled,
}

/// What to do when a page fails to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Stop and return the write error.
    #[default]
    Abort,
    /// Record the failure in the report and keep paginating.
    Continue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Stop after this many applied pages.
    pub max_pages: Option<usize>,
    pub on_write_error: WriteFailurePolicy,
}

/// A page that did not fully apply under [`WriteFailurePolicy::Continue`].
#[derive(Debug)]
pub struct PageFailure {
    /// 1-based page number.
    pub page: usize,
    pub error: StoreWriteError,
}

/// Outcome of a completed ingestion run.
#[derive(Debug)]
pub struct IngestReport {
    /// Pages fetched and applied (including ones that failed to apply).
    pub pages: usize,
    /// Committed upserts across all pages.
    pub committed: BatchResult,
    /// Cursor to continue from on the next run.
    pub cursor: Option<Cursor>,
    pub failures: Vec<PageFailure>,
    pub stop: StopReason,
}

impl IngestReport {
    pub(super) fn new() -> Self {
        Self {
            pages: 0,
            committed: BatchResult::default(),
            cursor: None,
            failures: Vec::new(),
            stop: StopReason::EmptyPage,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
