//! Error types for ingestion.

use thiserror::Error;

use crate::model::Cursor;
use crate::source::SourceFetchError;
use crate::store::StoreWriteError;

/// Top-level error returned by [`Ingestor::run`](super::Ingestor::run).
///
/// `resume` is the last cursor whose page was fully applied; `None` means
/// start of history.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed after {pages} page(s), resume from {}: {source}", resume_point(.resume))]
    Fetch {
        pages: usize,
        resume: Option<Cursor>,
        source: SourceFetchError,
    },

    #[error("write failed on page {page}, resume from {}: {source}", resume_point(.resume))]
    Write {
        page: usize,
        resume: Option<Cursor>,
        source: StoreWriteError,
    },
}

impl IngestError {
    pub fn resume(&self) -> Option<&Cursor> {
        match self {
            IngestError::Fetch { resume, .. } | IngestError::Write { resume, .. } => {
                resume.as_ref()
            }
        }
    }
}

fn resume_point(cursor: &Option<Cursor>) -> String {
    match cursor {
        Some(cursor) => cursor.to_string(),
        None => "start of history".to_string(),
    }
}
