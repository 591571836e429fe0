//! Cursor-driven ingestion loop.
//!
//! The loop pulls a page from a [`LedgerSource`], upserts its records into a
//! [`RecordStore`] by natural key and continues from the returned cursor until
//! the source is exhausted. Each step depends on the previous cursor, so the
//! loop is strictly sequential.

use std::future::{Future, pending};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::{Cursor, NATURAL_KEY};
use crate::source::LedgerSource;
use crate::store::RecordStore;

mod state;
pub use state::{
    IngestOptions, IngestReport, IngestState, PageFailure, StopReason, WriteFailurePolicy,
};

mod error;
pub use error::IngestError;

/// Drives pagination against a ledger source into a record store.
pub struct Ingestor<S, L> {
    store: Arc<S>,
    source: L,
    options: IngestOptions,
    state: IngestState,
}

/// Public API
impl<S: RecordStore, L: LedgerSource> Ingestor<S, L> {
    pub fn new(store: Arc<S>, source: L) -> Self {
        Self {
            store,
            source,
            options: IngestOptions::default(),
            state: IngestState::Idle,
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Ingest from the start of history until the source is exhausted.
    pub async fn run(&mut self) -> Result<IngestReport, IngestError> {
        self.run_until(pending()).await
    }

    /// Like [`run`](Self::run), but stop early once `shutdown` resolves.
    ///
    /// Shutdown is observed before each fetch and abandons an in-flight
    /// fetch. A page that is being applied is always finished first.
    pub async fn run_until(
        &mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<IngestReport, IngestError> {
        tokio::pin!(shutdown);

        let mut report = IngestReport::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            self.transition(IngestState::Fetching);
            let fetched = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    report.stop = StopReason::Cancelled;
                    break;
                }
                page = self.source.fetch(cursor.as_ref()) => page,
            };

            let page = match fetched {
                Ok(page) => page,
                Err(source) => {
                    self.transition(IngestState::Terminated);
                    warn!(pages = report.pages, reason = %source, "fetch failed");
                    return Err(IngestError::Fetch {
                        pages: report.pages,
                        resume: cursor,
                        source,
                    });
                }
            };

            if page.records.is_empty() {
                report.stop = StopReason::EmptyPage;
                break;
            }

            self.transition(IngestState::Applying);
            let number = report.pages + 1;
            match self.store.upsert_many(&NATURAL_KEY, &page.records).await {
                Ok(batch) => {
                    info!(
                        page = number,
                        records = page.records.len(),
                        applied = batch.applied(),
                        inserted = batch.inserted,
                        replaced = batch.replaced,
                        "page applied"
                    );
                    report.committed.absorb(batch);
                }
                Err(error) => match self.options.on_write_error {
                    WriteFailurePolicy::Abort => {
                        self.transition(IngestState::Terminated);
                        warn!(page = number, reason = %error, "page failed, aborting");
                        return Err(IngestError::Write {
                            page: number,
                            resume: cursor,
                            source: error,
                        });
                    }
                    WriteFailurePolicy::Continue => {
                        warn!(page = number, reason = %error, "page partially applied, continuing");
                        report.committed.absorb(error.committed);
                        report.failures.push(PageFailure {
                            page: number,
                            error,
                        });
                    }
                },
            }
            report.pages = number;

            match page.next_cursor {
                None => {
                    report.stop = StopReason::NoCursor;
                    break;
                }
                Some(next) if cursor.as_ref() == Some(&next) => {
                    report.stop = StopReason::CursorUnchanged;
                    break;
                }
                Some(next) => cursor = Some(next),
            }

            if self.options.max_pages.is_some_and(|max| report.pages >= max) {
                report.stop = StopReason::PageLimit;
                break;
            }
        }

        self.transition(IngestState::Terminated);
        report.cursor = cursor;
        info!(
            pages = report.pages,
            committed = %report.committed,
            failures = report.failures.len(),
            stop = ?report.stop,
            "ingestion finished"
        );
        Ok(report)
    }
}

/// Private API
impl<S, L> Ingestor<S, L> {
    fn transition(&mut self, next: IngestState) {
        debug!(from = %self.state, to = %next, "ingest state");
        self.state = next;
    }
}
